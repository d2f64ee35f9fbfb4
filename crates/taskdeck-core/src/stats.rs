use chrono::NaiveDate;
use taskdeck_shared::TaskDto;

use crate::datetime::{
  DueStatus,
  due_status
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub struct TaskStats {
  pub total:     usize,
  pub open:      usize,
  pub done:      usize,
  pub due_today: usize,
  pub overdue:   usize
}

/// Counts over the whole list, with
/// the same day boundary as the filter
/// modes. Completed tasks never count
/// as due today or overdue.
#[must_use]
pub fn compute_stats(
  tasks: &[TaskDto],
  today: NaiveDate
) -> TaskStats {
  let mut stats = TaskStats {
    total: tasks.len(),
    ..TaskStats::default()
  };

  for task in tasks.iter().filter(|t| !t.done)
  {
    stats.open += 1;
    match due_status(
      task.due_date.as_deref(),
      today
    ) {
      | DueStatus::Today => {
        stats.due_today += 1
      }
      | DueStatus::Overdue => {
        stats.overdue += 1
      }
      | _ => {}
    }
  }

  stats.done = stats.total - stats.open;
  stats
}
