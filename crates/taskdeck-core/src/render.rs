use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use taskdeck_shared::{TagSummary, TaskDocumentDto, TaskDto};
use unicode_width::UnicodeWidthStr;

use crate::config::{Config, KEY_COLOR};
use crate::dashboard::DashboardSnapshot;
use crate::datetime::{DueStatus, due_status};
use crate::form::join_tags;
use crate::stats::TaskStats;

const RED: &str = "31";
const GREEN: &str = "32";
const YELLOW: &str = "33";
const DIM: &str = "2";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get(KEY_COLOR).unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self::with_color(color && io::stdout().is_terminal()))
    }

    pub fn with_color(color: bool) -> Self {
        Self { color }
    }

    #[tracing::instrument(skip_all, fields(visible = snapshot.visible.len()))]
    pub fn write_dashboard<W: Write>(
        &self,
        out: &mut W,
        snapshot: &DashboardSnapshot,
    ) -> anyhow::Result<()> {
        self.write_stats(out, &snapshot.stats)?;
        writeln!(out, "filter: {}", snapshot.mode.label())?;

        if let Some(err) = &snapshot.last_error {
            writeln!(out, "{}", self.paint(&format!("error: {err}"), RED))?;
        }

        if snapshot.visible.is_empty() {
            writeln!(out, "No tasks match.")?;
            return Ok(());
        }

        self.write_task_table(out, &snapshot.visible, snapshot.today)
    }

    pub fn write_stats<W: Write>(&self, out: &mut W, stats: &TaskStats) -> anyhow::Result<()> {
        writeln!(
            out,
            "total {}  open {}  done {}  {}  {}",
            stats.total,
            stats.open,
            stats.done,
            self.paint(&format!("today {}", stats.due_today), YELLOW),
            self.paint(&format!("overdue {}", stats.overdue), RED),
        )?;
        Ok(())
    }

    pub fn write_task_table<W: Write>(
        &self,
        out: &mut W,
        tasks: &[TaskDto],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Prio".to_string(),
            "Due".to_string(),
            "Title".to_string(),
            "Tags".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());

        for task in tasks {
            let done = if task.done {
                self.paint("[x]", GREEN)
            } else {
                "[ ]".to_string()
            };

            let due = task.due_date.clone().unwrap_or_default();
            let due = if task.done {
                due
            } else {
                self.paint_due(&due, due_status(task.due_date.as_deref(), today))
            };

            let title = if task.done {
                self.paint(&task.title, DIM)
            } else {
                task.title.clone()
            };

            let tags = task
                .tags
                .iter()
                .map(|tag| format!("#{tag}"))
                .collect::<Vec<_>>()
                .join(" ");

            rows.push(vec![
                task.id.to_string(),
                done,
                task.priority.to_string(),
                due,
                title,
                tags,
            ]);
        }

        write_table(out, headers, rows)
    }

    pub fn write_task_info<W: Write>(
        &self,
        out: &mut W,
        task: &TaskDto,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let status = due_status(task.due_date.as_deref(), today);

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "title     {}", task.title)?;
        writeln!(out, "status    {}", if task.done { "done" } else { "open" })?;
        writeln!(out, "priority  {}", task.priority)?;
        match &task.due_date {
            Some(due) => writeln!(
                out,
                "due       {} ({})",
                self.paint_due(due, status),
                status.label()
            )?,
            None => writeln!(out, "due       -")?,
        }
        writeln!(out, "tags      {}", join_tags(&task.tags))?;
        if let Some(notes) = task.notes.as_deref().filter(|n| !n.is_empty()) {
            writeln!(out, "notes     {notes}")?;
        }
        writeln!(out, "created   {}", task.created_at)?;
        writeln!(out, "updated   {}", task.updated_at)?;

        Ok(())
    }

    pub fn write_documents<W: Write>(
        &self,
        out: &mut W,
        documents: &[TaskDocumentDto],
    ) -> anyhow::Result<()> {
        if documents.is_empty() {
            writeln!(out, "No documents.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Name".to_string(),
            "Type".to_string(),
            "Size".to_string(),
            "Uploaded".to_string(),
        ];
        let rows = documents
            .iter()
            .map(|doc| {
                vec![
                    doc.id.to_string(),
                    doc.original_name.clone(),
                    doc.content_type.clone().unwrap_or_else(|| "-".to_string()),
                    doc.size.map(format_size).unwrap_or_else(|| "-".to_string()),
                    doc.created_at.clone(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn write_tags<W: Write>(&self, out: &mut W, tags: &[TagSummary]) -> anyhow::Result<()> {
        if tags.is_empty() {
            writeln!(out, "No tags.")?;
            return Ok(());
        }

        let headers = vec!["Tag".to_string(), "Open".to_string(), "Total".to_string()];
        let rows = tags
            .iter()
            .map(|tag| {
                vec![
                    format!("#{}", tag.name),
                    tag.open.to_string(),
                    tag.total.to_string(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn paint_due(&self, text: &str, status: DueStatus) -> String {
        match status {
            DueStatus::Overdue => self.paint(text, RED),
            DueStatus::Today => self.paint(text, YELLOW),
            _ => text.to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn write_table<W: Write>(
    writer: &mut W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(header.as_str()))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| format!("{header:width$}"))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{}", header_line.trim_end())?;

    let rule = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{rule}")?;

    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| {
                let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
                format!("{cell}{}", " ".repeat(width.saturating_sub(visible_width)))
            })
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
