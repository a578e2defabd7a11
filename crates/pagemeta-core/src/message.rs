//! Field-scoped outcome messages for display next to a form.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
  Warning,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
  pub level: Level,
  /// Canonical name of the field concerned, or the name as submitted when
  /// it could not be resolved. `None` for store-wide messages.
  pub field: Option<String>,
  pub text:  String,
}

impl Message {
  pub fn warning(field: Option<&str>, text: impl Into<String>) -> Self {
    Self { level: Level::Warning, field: field.map(str::to_owned), text: text.into() }
  }

  pub fn error(field: Option<&str>, text: impl Into<String>) -> Self {
    Self { level: Level::Error, field: field.map(str::to_owned), text: text.into() }
  }
}

impl std::fmt::Display for Message {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let level = match self.level {
      Level::Warning => "warning",
      Level::Error => "error",
    };
    match &self.field {
      Some(field) => write!(f, "{level} [{field}]: {}", self.text),
      None => write!(f, "{level}: {}", self.text),
    }
  }
}
