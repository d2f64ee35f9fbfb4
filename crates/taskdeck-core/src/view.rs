use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use taskdeck_shared::TaskDto;
use tracing::trace;

use crate::datetime::{
  DueStatus,
  due_status,
  parse_due_date
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum FilterMode {
  #[default]
  All,
  Open,
  Today,
  Overdue
}

impl FilterMode {
  pub fn all() -> [Self; 4] {
    [
      Self::All,
      Self::Open,
      Self::Today,
      Self::Overdue
    ]
  }

  pub fn as_key(self) -> &'static str {
    match self {
      | Self::All => "all",
      | Self::Open => "open",
      | Self::Today => "today",
      | Self::Overdue => "overdue"
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | Self::All => "All tasks",
      | Self::Open => "Open tasks",
      | Self::Today => "Due today",
      | Self::Overdue => "Overdue tasks"
    }
  }
}

impl fmt::Display for FilterMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

impl FromStr for FilterMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let key =
      s.trim().to_ascii_lowercase();
    Self::all()
      .into_iter()
      .find(|mode| mode.as_key() == key)
      .ok_or_else(|| {
        anyhow!(
          "unknown filter mode '{s}', \
           expected all|open|today|\
           overdue"
        )
      })
  }
}

#[must_use]
pub fn matches_mode(
  task: &TaskDto,
  mode: FilterMode,
  today: NaiveDate
) -> bool {
  let ok = match mode {
    | FilterMode::All => true,
    | FilterMode::Open => !task.done,
    | FilterMode::Today => {
      !task.done
        && due_status(
          task.due_date.as_deref(),
          today
        ) == DueStatus::Today
    }
    | FilterMode::Overdue => {
      !task.done
        && due_status(
          task.due_date.as_deref(),
          today
        ) == DueStatus::Overdue
    }
  };

  trace!(task_id = task.id, mode = %mode, ok, "filter mode evaluation");
  ok
}

/// Sort position of a due date.
/// Variant order is the sort order:
/// parseable dates, then unparseable
/// strings, then no date at all.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
)]
enum DueKey<'a> {
  Dated(NaiveDate),
  Unparseable(&'a str),
  Undated
}

fn due_key(task: &TaskDto) -> DueKey<'_> {
  match task.due_date.as_deref() {
    | None => DueKey::Undated,
    | Some(raw) if raw.trim().is_empty() => {
      DueKey::Undated
    }
    | Some(raw) => {
      match parse_due_date(raw) {
        | Some(day) => DueKey::Dated(day),
        | None => DueKey::Unparseable(raw)
      }
    }
  }
}

/// Open before done, then priority
/// ascending, then due date, then the
/// newest id first.
#[must_use]
pub fn compare_tasks(
  a: &TaskDto,
  b: &TaskDto
) -> Ordering {
  a.done
    .cmp(&b.done)
    .then_with(|| {
      a.priority.cmp(&b.priority)
    })
    .then_with(|| {
      due_key(a).cmp(&due_key(b))
    })
    .then_with(|| b.id.cmp(&a.id))
}

pub fn sort_tasks(tasks: &mut [TaskDto]) {
  tasks.sort_by(compare_tasks);
}

#[must_use]
pub fn filter_tasks(
  tasks: &[TaskDto],
  mode: FilterMode,
  today: NaiveDate
) -> Vec<TaskDto> {
  tasks
    .iter()
    .filter(|task| {
      matches_mode(task, mode, today)
    })
    .cloned()
    .collect()
}

#[tracing::instrument(skip(tasks))]
#[must_use]
pub fn visible_tasks(
  tasks: &[TaskDto],
  mode: FilterMode,
  today: NaiveDate
) -> Vec<TaskDto> {
  let mut visible =
    filter_tasks(tasks, mode, today);
  sort_tasks(&mut visible);
  visible
}

/// Case-insensitive title match over an
/// already-loaded list.
#[must_use]
pub fn search_tasks(
  tasks: &[TaskDto],
  query: &str
) -> Vec<TaskDto> {
  let q = query.trim().to_lowercase();
  if q.is_empty() {
    return tasks.to_vec();
  }

  tasks
    .iter()
    .filter(|task| {
      task.title.to_lowercase().contains(&q)
    })
    .cloned()
    .collect()
}
