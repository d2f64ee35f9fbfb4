use taskdeck_shared::{
  DEFAULT_PRIORITY,
  Field,
  MAX_PRIORITY,
  MIN_PRIORITY,
  TaskCreate,
  TaskDto,
  TaskPatch
};
use thiserror::Error;

use crate::datetime::parse_due_date;

const TAG_SEPARATOR: char = ',';
const TAG_JOINER: &str = ", ";

#[derive(
  Debug, Clone, PartialEq, Eq, Error,
)]
pub enum FormError {
  #[error("title is required")]
  MissingTitle,
  #[error(
    "priority must be between 1 and \
     5, got {0}"
  )]
  PriorityOutOfRange(u8),
  #[error(
    "due date must look like \
     YYYY-MM-DD, got '{0}'"
  )]
  InvalidDueDate(String)
}

/// Editable text fields of the task
/// dialog. Empty `due_date` and `notes`
/// mean "no value".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFormData {
  pub title:    String,
  pub priority: u8,
  pub due_date: String,
  pub notes:    String,
  pub tags:     String
}

impl Default for TaskFormData {
  fn default() -> Self {
    Self {
      title:    String::new(),
      priority: DEFAULT_PRIORITY,
      due_date: String::new(),
      notes:    String::new(),
      tags:     String::new()
    }
  }
}

impl TaskFormData {
  pub fn from_task(task: &TaskDto) -> Self {
    Self {
      title:    task.title.clone(),
      priority: task.priority,
      due_date: task
        .due_date
        .clone()
        .unwrap_or_default(),
      notes:    task
        .notes
        .clone()
        .unwrap_or_default(),
      tags:     join_tags(&task.tags)
    }
  }

  pub fn tag_list(&self) -> Vec<String> {
    split_tags(&self.tags)
  }

  pub fn validate(
    &self
  ) -> Result<(), FormError> {
    check_title(&self.title)?;
    check_priority(self.priority)?;
    check_due_date(&self.due_date)
  }

  pub fn to_create(
    &self
  ) -> Result<TaskCreate, FormError> {
    self.validate()?;
    Ok(TaskCreate {
      title:    self.title.trim().to_string(),
      priority: self.priority,
      due_date: optional_text(
        &self.due_date
      ),
      notes:    note_text(&self.notes),
      tags:     self.tag_list()
    })
  }

  /// Patch carrying only the fields that
  /// differ from `baseline`, the form as it
  /// was loaded. Only those fields are
  /// validated, so a stored value the
  /// server accepted never blocks an edit
  /// of another field. Blank optional
  /// fields become `Field::Cleared`.
  pub fn to_patch(
    &self,
    baseline: &TaskFormData
  ) -> Result<TaskPatch, FormError> {
    let mut patch = TaskPatch::default();

    let title = self.title.trim();
    if title != baseline.title.trim() {
      check_title(title)?;
      patch.title =
        Field::Value(title.to_string());
    }

    if self.priority != baseline.priority {
      check_priority(self.priority)?;
      patch.priority =
        Field::Value(self.priority);
    }

    let due = optional_text(&self.due_date);
    if due
      != optional_text(&baseline.due_date)
    {
      check_due_date(&self.due_date)?;
      patch.due_date =
        Field::from_option(due);
    }

    let notes = note_text(&self.notes);
    if notes != note_text(&baseline.notes) {
      patch.notes =
        Field::from_option(notes);
    }

    let tags = self.tag_list();
    if tags != baseline.tag_list() {
      patch.tags = Field::Value(tags);
    }

    Ok(patch)
  }
}

fn check_title(
  title: &str
) -> Result<(), FormError> {
  if title.trim().is_empty() {
    return Err(FormError::MissingTitle);
  }
  Ok(())
}

fn check_priority(
  priority: u8
) -> Result<(), FormError> {
  if !(MIN_PRIORITY..=MAX_PRIORITY)
    .contains(&priority)
  {
    return Err(
      FormError::PriorityOutOfRange(
        priority
      )
    );
  }
  Ok(())
}

fn check_due_date(
  due_date: &str
) -> Result<(), FormError> {
  if let Some(due) = optional_text(due_date)
    && parse_due_date(&due).is_none()
  {
    return Err(FormError::InvalidDueDate(
      due
    ));
  }
  Ok(())
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum EditorMode {
  Create,
  Edit(u64)
}

/// One open create/edit dialog. A failed
/// submit keeps it open with the form
/// untouched and the message in `error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSession {
  pub mode:  EditorMode,
  pub form:  TaskFormData,
  pub error: Option<String>,
  baseline:  TaskFormData,
  open:      bool
}

impl EditorSession {
  pub fn create() -> Self {
    Self {
      mode:     EditorMode::Create,
      form:     TaskFormData::default(),
      error:    None,
      baseline: TaskFormData::default(),
      open:     true
    }
  }

  pub fn edit(task: &TaskDto) -> Self {
    let form = TaskFormData::from_task(task);
    Self {
      mode: EditorMode::Edit(task.id),
      baseline: form.clone(),
      form,
      error: None,
      open: true
    }
  }

  /// The form as it was when the session
  /// opened.
  pub fn baseline(&self) -> &TaskFormData {
    &self.baseline
  }

  pub fn edit_patch(
    &self
  ) -> Result<TaskPatch, FormError> {
    self.form.to_patch(&self.baseline)
  }

  pub fn is_open(&self) -> bool {
    self.open
  }

  pub(crate) fn fail(
    &mut self,
    message: String
  ) {
    self.error = Some(message);
  }

  pub(crate) fn close(&mut self) {
    self.error = None;
    self.open = false;
  }
}

pub fn join_tags(tags: &[String]) -> String {
  tags.join(TAG_JOINER)
}

/// Splits on commas, trims, drops empty
/// segments and repeats. First occurrence
/// keeps its position.
pub fn split_tags(text: &str) -> Vec<String> {
  let mut tags = Vec::new();
  for segment in text.split(TAG_SEPARATOR) {
    push_tag_unique(
      &mut tags,
      segment.to_string()
    );
  }
  tags
}

fn push_tag_unique(
  tags: &mut Vec<String>,
  tag: String
) -> bool {
  let trimmed = tag.trim();
  if trimmed.is_empty() {
    return false;
  }

  if tags
    .iter()
    .any(|existing| existing == trimmed)
  {
    return false;
  }

  tags.push(trimmed.to_string());
  true
}

/// Whitespace-only notes mean "none";
/// anything else is kept verbatim.
pub fn note_text(
  text: &str
) -> Option<String> {
  if text.trim().is_empty() {
    None
  } else {
    Some(text.to_string())
  }
}

pub fn optional_text(
  text: &str
) -> Option<String> {
  let trimmed = text.trim();
  if trimmed.is_empty() {
    None
  } else {
    Some(trimmed.to_string())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use taskdeck_shared::{
    Field,
    TaskDto
  };

  use super::*;

  fn stored_task() -> TaskDto {
    TaskDto {
      id:         4,
      title:      "file taxes".to_string(),
      done:       false,
      priority:   2,
      due_date:   None,
      created_at: String::new(),
      updated_at: String::new(),
      notes:      None,
      tags:       vec![
        "a".to_string(),
        "b".to_string(),
      ]
    }
  }

  #[test]
  fn tags_round_trip_through_form() {
    let form =
      TaskFormData::from_task(&stored_task());
    assert_eq!(form.tags, "a, b");
    assert_eq!(form.due_date, "");
    assert_eq!(form.notes, "");

    let create =
      form.to_create().expect("valid form");
    assert_eq!(create.tags, vec![
      "a".to_string(),
      "b".to_string()
    ]);
  }

  #[test]
  fn split_trims_and_drops_empty_and_repeats()
  {
    assert_eq!(
      split_tags(" work ,, home,work , "),
      vec![
        "work".to_string(),
        "home".to_string()
      ]
    );
    assert!(split_tags("").is_empty());
  }

  #[test]
  fn blank_optionals_become_null() {
    let form = TaskFormData {
      title: "call mum".to_string(),
      due_date: String::new(),
      notes: "   ".to_string(),
      ..TaskFormData::default()
    };

    let create =
      form.to_create().expect("valid form");
    let value = serde_json::to_value(
      &create
    )
    .expect("serialize");
    assert_eq!(value["due_date"], json!(null));
    assert_eq!(value["notes"], json!(null));

    let stored = TaskFormData {
      due_date: "2026-03-02".to_string(),
      notes: "ask about june".to_string(),
      ..form.clone()
    };
    let patch = form
      .to_patch(&stored)
      .expect("valid form");
    assert_eq!(
      patch.due_date,
      Field::Cleared
    );
    assert_eq!(patch.notes, Field::Cleared);
    let value = serde_json::to_value(
      &patch
    )
    .expect("serialize");
    assert_eq!(value["due_date"], json!(null));
    assert_eq!(value["notes"], json!(null));
    assert!(value.get("done").is_none());
  }

  #[test]
  fn filled_optionals_are_sent() {
    let form = TaskFormData {
      title: " review PR ".to_string(),
      priority: 1,
      due_date: "2026-03-02".to_string(),
      notes: "before standup".to_string(),
      tags: "work".to_string()
    };

    let patch = form
      .to_patch(&TaskFormData::default())
      .expect("valid form");
    assert_eq!(
      patch.title,
      Field::Value("review PR".to_string())
    );
    assert_eq!(
      patch.due_date,
      Field::Value("2026-03-02".to_string())
    );
    assert_eq!(
      patch.notes,
      Field::Value(
        "before standup".to_string()
      )
    );
  }

  #[test]
  fn rejects_invalid_forms() {
    let blank = TaskFormData::default();
    assert_eq!(
      blank.validate(),
      Err(FormError::MissingTitle)
    );

    let loud = TaskFormData {
      title: "x".to_string(),
      priority: 9,
      ..TaskFormData::default()
    };
    assert_eq!(
      loud.to_create(),
      Err(FormError::PriorityOutOfRange(9))
    );

    let bad_due = TaskFormData {
      title: "x".to_string(),
      due_date: "tomorrow".to_string(),
      ..TaskFormData::default()
    };
    assert_eq!(
      bad_due.to_patch(
        &TaskFormData::default()
      ),
      Err(FormError::InvalidDueDate(
        "tomorrow".to_string()
      ))
    );
  }

  #[test]
  fn edit_session_starts_from_task() {
    let session =
      EditorSession::edit(&stored_task());
    assert_eq!(
      session.mode,
      EditorMode::Edit(4)
    );
    assert!(session.is_open());
    assert_eq!(session.form.priority, 2);
  }

  #[test]
  fn edit_patch_leaves_untouched_fields_unset()
  {
    let task = TaskDto {
      priority: 0,
      due_date: Some("next week".to_string()),
      notes: Some(
        "  indented note\n".to_string()
      ),
      ..stored_task()
    };
    let mut session = EditorSession::edit(&task);
    session.form.title =
      "file taxes early".to_string();

    let patch = session
      .edit_patch()
      .expect("only the title changed");
    assert_eq!(
      patch.title,
      Field::Value(
        "file taxes early".to_string()
      )
    );
    assert!(patch.priority.is_unset());
    assert!(patch.due_date.is_unset());
    assert!(patch.notes.is_unset());
    assert!(patch.tags.is_unset());
    assert!(patch.done.is_unset());
  }

  #[test]
  fn edit_patch_checks_changed_fields() {
    let task = TaskDto {
      due_date: Some("next week".to_string()),
      ..stored_task()
    };
    let mut session = EditorSession::edit(&task);
    session.form.due_date =
      "someday".to_string();
    assert_eq!(
      session.edit_patch(),
      Err(FormError::InvalidDueDate(
        "someday".to_string()
      ))
    );

    session.form.due_date.clear();
    session.form.priority = 6;
    assert_eq!(
      session.edit_patch(),
      Err(FormError::PriorityOutOfRange(6))
    );

    session.form.priority = 2;
    let patch =
      session.edit_patch().expect("valid");
    assert_eq!(patch.due_date, Field::Cleared);
    assert!(patch.priority.is_unset());
  }

  #[test]
  fn unchanged_form_yields_empty_patch() {
    let session =
      EditorSession::edit(&stored_task());
    assert_eq!(
      session.baseline(),
      &session.form
    );
    assert!(
      session
        .edit_patch()
        .expect("valid")
        .is_empty()
    );
  }

  #[test]
  fn notes_keep_their_whitespace() {
    let form = TaskFormData {
      title: "call mum".to_string(),
      notes: "  indented note\n".to_string(),
      ..TaskFormData::default()
    };
    let create =
      form.to_create().expect("valid form");
    assert_eq!(
      create.notes.as_deref(),
      Some("  indented note\n")
    );
    assert_eq!(note_text(" \n\t"), None);
  }
}
