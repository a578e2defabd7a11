//! Typed metadata values and provenance tags.

use chrono::{DateTime, Utc};

use crate::{descriptor::DataType, tabular::Table};

// ─── TypedValue ──────────────────────────────────────────────────────────────

/// The decoded, in-memory form of a metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
  Text(String),
  Boolean(bool),
  Integer(i64),
  Date(DateTime<Utc>),
  List(Vec<String>),
  Table(Table),
}

impl TypedValue {
  pub fn text(s: impl Into<String>) -> Self { Self::Text(s.into()) }

  pub fn list<I, S>(items: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::List(items.into_iter().map(Into::into).collect())
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Self::Boolean(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_integer(&self) -> Option<i64> {
    match self {
      Self::Integer(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_date(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::Date(d) => Some(*d),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&[String]> {
    match self {
      Self::List(l) => Some(l),
      _ => None,
    }
  }

  pub fn as_table(&self) -> Option<&Table> {
    match self {
      Self::Table(t) => Some(t),
      _ => None,
    }
  }

  /// Whether this variant is the in-memory form of `data_type`.
  pub fn fits(&self, data_type: DataType) -> bool {
    matches!(
      (self, data_type),
      (Self::Text(_), DataType::Text | DataType::Paragraph)
        | (Self::Boolean(_), DataType::Boolean)
        | (Self::Integer(_), DataType::Integer)
        | (Self::Date(_), DataType::Date)
        | (Self::List(_), DataType::List)
        | (Self::Table(_), DataType::Tabular)
    )
  }

  /// Empty text, lists and tables carry no information and are stored as
  /// absent.
  pub fn is_empty(&self) -> bool {
    match self {
      Self::Text(s) => s.trim().is_empty(),
      Self::List(l) => l.is_empty(),
      Self::Table(t) => t.is_empty(),
      Self::Boolean(_) | Self::Integer(_) | Self::Date(_) => false,
    }
  }
}

// ─── Origin ──────────────────────────────────────────────────────────────────

/// Who produced a persisted value that carries a provenance tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
  /// Computed by the wiki engine (e.g. a generated abstract).
  System,
  /// Entered by an end user through this plugin.
  User,
  /// Written by another plugin, or untagged.
  External,
}

impl Origin {
  pub fn as_tag(self) -> &'static str {
    match self {
      Self::System => "system",
      Self::User => "user",
      Self::External => "external",
    }
  }

  /// Unknown tags are read as [`Origin::External`].
  pub fn from_tag(tag: Option<&str>) -> Self {
    match tag {
      Some("system") => Self::System,
      Some("user") => Self::User,
      _ => Self::External,
    }
  }
}
