use serde::{
  Deserialize,
  Deserializer,
  Serialize,
  Serializer
};

pub const DEFAULT_PRIORITY: u8 = 3;
pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 5;

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskDto {
  pub id:         u64,
  #[serde(default)]
  pub title:      String,
  #[serde(default)]
  pub done:       bool,
  #[serde(
    default = "default_priority"
  )]
  pub priority:   u8,
  pub due_date:   Option<String>,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
  pub notes:      Option<String>,
  #[serde(default)]
  pub tags:       Vec<String>
}

fn default_priority() -> u8 {
  DEFAULT_PRIORITY
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskDocumentDto {
  pub id:            u64,
  pub task_id:       u64,
  pub original_name: String,
  pub content_type:  Option<String>,
  pub size:          Option<u64>,
  #[serde(default)]
  pub created_at:    String,
  pub download_url:  String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TagSummary {
  pub name:  String,
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub open:  u64
}

/// Query for `GET /tasks`. Absent
/// filters are left out of the query
/// string entirely.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TasksListArgs {
  pub show_done: bool,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub search:    Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub tag:       Option<String>
}

impl Default for TasksListArgs {
  fn default() -> Self {
    Self {
      show_done: true,
      search:    None,
      tag:       None
    }
  }
}

/// Body of `POST /tasks`. Missing
/// optional values go out as `null`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskCreate {
  pub title:    String,
  pub priority: u8,
  pub due_date: Option<String>,
  pub notes:    Option<String>,
  pub tags:     Vec<String>
}

/// One optional field of a partial
/// update.
///
/// `Unset` leaves the server value
/// alone and is omitted from the body,
/// `Cleared` is sent as `null`, and
/// `Value` carries the new value.
#[derive(
  Debug, Clone, PartialEq, Eq,
)]
pub enum Field<T> {
  Unset,
  Cleared,
  Value(T)
}

impl<T> Default for Field<T> {
  fn default() -> Self {
    Field::Unset
  }
}

impl<T> Field<T> {
  pub fn is_unset(&self) -> bool {
    matches!(self, Field::Unset)
  }

  pub fn value(&self) -> Option<&T> {
    match self {
      | Field::Value(v) => Some(v),
      | _ => None
    }
  }

  /// `None` means "clear", not "leave
  /// unchanged".
  pub fn from_option(
    value: Option<T>
  ) -> Self {
    match value {
      | Some(v) => Field::Value(v),
      | None => Field::Cleared
    }
  }
}

impl<T> Serialize for Field<T>
where
  T: Serialize
{
  fn serialize<S>(
    &self,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    match self {
      | Field::Value(v) => {
        v.serialize(serializer)
      }
      | Field::Unset | Field::Cleared => {
        serializer.serialize_none()
      }
    }
  }
}

impl<'de, T> Deserialize<'de>
  for Field<T>
where
  T: Deserialize<'de>
{
  fn deserialize<D>(
    deserializer: D
  ) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    Option::<T>::deserialize(
      deserializer
    )
    .map(Field::from_option)
  }
}

/// Body of `PATCH /tasks/{id}`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
  Eq,
)]
pub struct TaskPatch {
  #[serde(
    default,
    skip_serializing_if = "Field::is_unset"
  )]
  pub title:    Field<String>,
  #[serde(
    default,
    skip_serializing_if = "Field::is_unset"
  )]
  pub priority: Field<u8>,
  #[serde(
    default,
    skip_serializing_if = "Field::is_unset"
  )]
  pub due_date: Field<String>,
  #[serde(
    default,
    skip_serializing_if = "Field::is_unset"
  )]
  pub notes:    Field<String>,
  #[serde(
    default,
    skip_serializing_if = "Field::is_unset"
  )]
  pub tags:     Field<Vec<String>>,
  #[serde(
    default,
    skip_serializing_if = "Field::is_unset"
  )]
  pub done:     Field<bool>
}

impl TaskPatch {
  pub fn done(done: bool) -> Self {
    Self {
      done: Field::Value(done),
      ..Self::default()
    }
  }

  pub fn is_empty(&self) -> bool {
    self.title.is_unset()
      && self.priority.is_unset()
      && self.due_date.is_unset()
      && self.notes.is_unset()
      && self.tags.is_unset()
      && self.done.is_unset()
  }
}
