use anyhow::anyhow;
use chrono::{
  DateTime,
  Local,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use tracing::debug;

pub const TIMEZONE_ENV_VAR: &str =
  "TASKDECK_TIMEZONE";
pub const DUE_DATE_FORMAT: &str =
  "%Y-%m-%d";

/// Zone whose midnight separates
/// "today" from "overdue".
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum DayZone {
  Local,
  Named(Tz)
}

impl Default for DayZone {
  fn default() -> Self {
    DayZone::Local
  }
}

impl DayZone {
  pub fn parse(
    raw: &str
  ) -> anyhow::Result<Self> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
      || trimmed
        .eq_ignore_ascii_case("local")
    {
      return Ok(DayZone::Local);
    }

    let tz =
      trimmed.parse::<Tz>().map_err(
        |err| {
          anyhow!(
            "invalid timezone \
             '{trimmed}': {err}"
          )
        }
      )?;
    debug!(timezone = %tz, "resolved day-boundary timezone");
    Ok(DayZone::Named(tz))
  }

  #[must_use]
  pub fn today(
    &self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    match self {
      | DayZone::Local => {
        now
          .with_timezone(&Local)
          .date_naive()
      }
      | DayZone::Named(tz) => {
        now.with_timezone(tz).date_naive()
      }
    }
  }
}

/// Where a task's due date sits
/// relative to the current local day.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum DueStatus {
  Undated,
  Invalid,
  Overdue,
  Today,
  Future
}

impl DueStatus {
  pub fn label(self) -> &'static str {
    match self {
      | DueStatus::Undated => "none",
      | DueStatus::Invalid => "invalid",
      | DueStatus::Overdue => "overdue",
      | DueStatus::Today => "today",
      | DueStatus::Future => "future"
    }
  }
}

#[must_use]
pub fn parse_due_date(
  raw: &str
) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(
    raw.trim(),
    DUE_DATE_FORMAT
  )
  .ok()
}

#[must_use]
pub fn due_status(
  due_date: Option<&str>,
  today: NaiveDate
) -> DueStatus {
  let Some(raw) = due_date else {
    return DueStatus::Undated;
  };
  if raw.trim().is_empty() {
    return DueStatus::Undated;
  }

  match parse_due_date(raw) {
    | None => DueStatus::Invalid,
    | Some(day) if day < today => {
      DueStatus::Overdue
    }
    | Some(day) if day == today => {
      DueStatus::Today
    }
    | Some(_) => DueStatus::Future
  }
}
