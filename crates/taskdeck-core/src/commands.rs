use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::api::{DocumentUpload, HttpTaskApi, TaskApi};
use crate::cli::{AddArgs, Command, DocsCommand, EditArgs, ListArgs, QueryArgs};
use crate::config::{Config, KEY_DEFAULT_FILTER};
use crate::dashboard::{Confirm, Dashboard, DashboardError};
use crate::documents::TaskDocuments;
use crate::form::EditorSession;
use crate::render::Renderer;
use crate::view::FilterMode;

/// Reads a yes/no answer from stdin.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        let mut out = io::stdout().lock();
        if write!(out, "{prompt} [y/N] ").and_then(|()| out.flush()).is_err() {
            return false;
        }

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        is_yes(&answer)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn confirmer(assume_yes: bool) -> Box<dyn Confirm> {
    if assume_yes {
        Box::new(|_: &str| true)
    } else {
        Box::new(StdinConfirm)
    }
}

#[instrument(skip(cfg, renderer, command))]
pub async fn dispatch(
    cfg: &Config,
    renderer: &Renderer,
    command: Option<Command>,
) -> anyhow::Result<()> {
    let api = HttpTaskApi::new(&cfg.api_url(), cfg.api_timeout()?)
        .context("failed to set up API client")?;
    let mut dashboard = Dashboard::new(api, cfg.day_zone()?, cfg.debounce_window()?);
    dashboard.set_show_done(cfg.show_done());

    let command = command.unwrap_or_else(|| Command::List(ListArgs::default()));
    debug!(command = ?command, api = %dashboard.api().base_url(), "dispatching command");

    let result = match command {
        Command::List(args) => cmd_list(&mut dashboard, cfg, renderer, args).await,
        Command::Stats(query) => cmd_stats(&mut dashboard, renderer, &query).await,
        Command::Show { id } => cmd_show(&mut dashboard, renderer, id).await,
        Command::Add(args) => cmd_add(&mut dashboard, args).await,
        Command::Edit(args) => cmd_edit(&mut dashboard, args).await,
        Command::Toggle { id } => cmd_toggle(&mut dashboard, id).await,
        Command::Done { id } => cmd_done(&mut dashboard, id).await,
        Command::Delete { id, yes } => cmd_delete(&mut dashboard, id, yes).await,
        Command::Search { term } => cmd_search(&mut dashboard, renderer, &term.join(" ")).await,
        Command::Tags => cmd_tags(&mut dashboard, renderer).await,
        Command::Docs(docs) => cmd_docs(dashboard.api(), renderer, docs).await,
    };

    match result {
        Err(err) if is_cancelled(&err) => {
            println!("Cancelled.");
            Ok(())
        }
        other => other,
    }
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<DashboardError>(),
        Some(DashboardError::Cancelled)
    )
}

fn apply_query<A: TaskApi>(dashboard: &mut Dashboard<A>, query: &QueryArgs) {
    if query.hide_done {
        dashboard.set_show_done(false);
    }
    dashboard.set_tag(query.tag.as_deref());
    dashboard.set_search(query.search.as_deref());
}

fn default_filter(cfg: &Config) -> anyhow::Result<FilterMode> {
    match cfg.get(KEY_DEFAULT_FILTER) {
        Some(raw) => raw
            .parse::<FilterMode>()
            .with_context(|| format!("invalid {KEY_DEFAULT_FILTER} setting")),
        None => Ok(FilterMode::default()),
    }
}

/// Commands addressing a task by id must see it
/// whatever the configured list query hides.
async fn reload_unfiltered<A: TaskApi>(dashboard: &mut Dashboard<A>) -> Result<(), DashboardError> {
    dashboard.set_show_done(true);
    dashboard.set_tag(None);
    dashboard.set_search(None);
    dashboard.reload().await.map(|_| ())
}

#[instrument(skip(dashboard, cfg, renderer, args))]
async fn cmd_list<A: TaskApi>(
    dashboard: &mut Dashboard<A>,
    cfg: &Config,
    renderer: &Renderer,
    args: ListArgs,
) -> anyhow::Result<()> {
    info!("command list");

    let mode = match args.filter {
        Some(mode) => mode,
        None => default_filter(cfg)?,
    };
    dashboard.set_mode(mode);
    apply_query(dashboard, &args.query);
    dashboard.reload().await?;

    let snapshot = dashboard.snapshot(Utc::now());
    renderer.write_dashboard(&mut io::stdout().lock(), &snapshot)
}

#[instrument(skip(dashboard, renderer, query))]
async fn cmd_stats<A: TaskApi>(
    dashboard: &mut Dashboard<A>,
    renderer: &Renderer,
    query: &QueryArgs,
) -> anyhow::Result<()> {
    info!("command stats");

    apply_query(dashboard, query);
    dashboard.reload().await?;

    let snapshot = dashboard.snapshot(Utc::now());
    renderer.write_stats(&mut io::stdout().lock(), &snapshot.stats)
}

#[instrument(skip(dashboard, renderer))]
async fn cmd_show<A: TaskApi>(
    dashboard: &mut Dashboard<A>,
    renderer: &Renderer,
    id: u64,
) -> anyhow::Result<()> {
    info!("command show");

    reload_unfiltered(dashboard).await?;
    let today = dashboard.today(Utc::now());
    let task = dashboard
        .task(id)
        .ok_or_else(|| anyhow!("task #{id} not found"))?;
    renderer.write_task_info(&mut io::stdout().lock(), task, today)
}

#[instrument(skip(dashboard, args))]
async fn cmd_add<A: TaskApi>(dashboard: &mut Dashboard<A>, args: AddArgs) -> anyhow::Result<()> {
    info!("command add");

    let mut session = EditorSession::create();
    session.form.title = args.title.join(" ");
    session.form.priority = args.priority;
    session.form.due_date = args.due.unwrap_or_default();
    session.form.notes = args.notes.unwrap_or_default();
    session.form.tags = args.tags.unwrap_or_default();

    let saved = dashboard.submit(&mut session).await?;
    println!("Created task {}.", saved.id);
    Ok(())
}

#[instrument(skip(dashboard, args), fields(id = args.id))]
async fn cmd_edit<A: TaskApi>(dashboard: &mut Dashboard<A>, args: EditArgs) -> anyhow::Result<()> {
    info!("command edit");

    reload_unfiltered(dashboard).await?;
    let task = dashboard
        .task(args.id)
        .ok_or_else(|| anyhow!("task #{} not found", args.id))?;

    let mut session = EditorSession::edit(task);
    if let Some(title) = args.title {
        session.form.title = title;
    }
    if let Some(priority) = args.priority {
        session.form.priority = priority;
    }
    if let Some(due) = args.due {
        session.form.due_date = due;
    }
    if let Some(notes) = args.notes {
        session.form.notes = notes;
    }
    if let Some(tags) = args.tags {
        session.form.tags = tags;
    }

    let saved = dashboard.submit(&mut session).await?;
    println!("Updated task {}.", saved.id);
    Ok(())
}

#[instrument(skip(dashboard))]
async fn cmd_toggle<A: TaskApi>(dashboard: &mut Dashboard<A>, id: u64) -> anyhow::Result<()> {
    info!("command toggle");

    reload_unfiltered(dashboard).await?;
    let task = dashboard.toggle_done(id).await?;
    let state = if task.done { "done" } else { "open" };
    println!("Task {} is now {state}.", task.id);
    Ok(())
}

#[instrument(skip(dashboard))]
async fn cmd_done<A: TaskApi>(dashboard: &mut Dashboard<A>, id: u64) -> anyhow::Result<()> {
    info!("command done");

    reload_unfiltered(dashboard).await?;
    let task = dashboard.mark_done(id).await?;
    println!("Completed task {}.", task.id);
    Ok(())
}

#[instrument(skip(dashboard))]
async fn cmd_delete<A: TaskApi>(
    dashboard: &mut Dashboard<A>,
    id: u64,
    yes: bool,
) -> anyhow::Result<()> {
    info!("command delete");

    reload_unfiltered(dashboard).await?;
    let mut confirm = confirmer(yes);
    dashboard.delete_task(id, &mut *confirm).await?;
    println!("Deleted task {id}.");
    Ok(())
}

/// One-shot search; the debounce window only
/// matters when input keeps arriving.
#[instrument(skip(dashboard, renderer))]
async fn cmd_search<A: TaskApi>(
    dashboard: &mut Dashboard<A>,
    renderer: &Renderer,
    term: &str,
) -> anyhow::Result<()> {
    info!("command search");

    let token = dashboard.search_input(term);
    debug!(?token, "search requested");
    dashboard.reload().await?;

    let snapshot = dashboard.snapshot(Utc::now());
    renderer.write_dashboard(&mut io::stdout().lock(), &snapshot)
}

#[instrument(skip(dashboard, renderer))]
async fn cmd_tags<A: TaskApi>(
    dashboard: &mut Dashboard<A>,
    renderer: &Renderer,
) -> anyhow::Result<()> {
    info!("command tags");

    let tags = dashboard.tag_summaries().await?;
    renderer.write_tags(&mut io::stdout().lock(), &tags)
}

#[instrument(skip(api, renderer, command))]
async fn cmd_docs<A: TaskApi>(
    api: &A,
    renderer: &Renderer,
    command: DocsCommand,
) -> anyhow::Result<()> {
    info!(command = ?command, "command docs");

    match command {
        DocsCommand::List { task_id } => {
            let mut docs = TaskDocuments::new(task_id);
            let listed = docs.refresh(api).await?;
            renderer.write_documents(&mut io::stdout().lock(), listed)
        }
        DocsCommand::Upload { task_id, path } => {
            let upload = DocumentUpload::from_path(&path).await?;
            let mut docs = TaskDocuments::new(task_id);
            let doc = docs.upload(api, upload).await?;
            println!(
                "Uploaded {} as document {} on task {task_id}.",
                doc.original_name, doc.id
            );
            Ok(())
        }
        DocsCommand::Download {
            task_id,
            doc_id,
            out,
        } => {
            let mut docs = TaskDocuments::new(task_id);
            docs.refresh(api).await?;
            let (doc, bytes) = docs.download(api, doc_id).await?;
            let target = download_target(out, &doc.original_name);
            tokio::fs::write(&target, &bytes)
                .await
                .with_context(|| format!("failed to write {}", target.display()))?;
            println!("Saved {} ({} bytes).", target.display(), bytes.len());
            Ok(())
        }
        DocsCommand::Delete {
            task_id,
            doc_id,
            yes,
        } => {
            let mut docs = TaskDocuments::new(task_id);
            docs.refresh(api).await?;
            let mut confirm = confirmer(yes);
            docs.remove(api, doc_id, &mut *confirm).await?;
            println!("Deleted document {doc_id}.");
            Ok(())
        }
    }
}

/// A directory target keeps the server's file
/// name; anything else is used as given.
fn download_target(out: Option<PathBuf>, original_name: &str) -> PathBuf {
    let file_name = Path::new(original_name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("document"));

    match out {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path,
        None => file_name,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{download_target, is_cancelled, is_yes};
    use crate::dashboard::DashboardError;

    #[test]
    fn only_yes_answers_confirm() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }

    #[test]
    fn download_target_keeps_server_name_inside_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(
            download_target(Some(dir.path().to_path_buf()), "../../report.pdf"),
            dir.path().join("report.pdf")
        );
        assert_eq!(
            download_target(Some(PathBuf::from("/tmp/copy.pdf")), "report.pdf"),
            PathBuf::from("/tmp/copy.pdf")
        );
        assert_eq!(download_target(None, "notes.txt"), PathBuf::from("notes.txt"));
    }

    #[test]
    fn cancelled_is_detected_through_anyhow() {
        let err = anyhow::Error::from(DashboardError::Cancelled);
        assert!(is_cancelled(&err));
        assert!(!is_cancelled(&anyhow::anyhow!("boom")));
    }
}
