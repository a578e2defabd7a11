//! Error types for `pagemeta-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A field name that no registered descriptor answers to.
  #[error("unknown metadata field: {0:?}")]
  NotFound(String),

  /// A value that is well-formed but not acceptable for the field.
  #[error("bad value for {field}: {message}")]
  BadArgument { field: String, message: String },

  /// A raw value whose shape cannot be decoded into the field's type.
  #[error("cannot decode {field}: {message}")]
  BadSyntax { field: String, message: String },

  /// A programmer error: build cycles, mismatched form columns, tabular
  /// operations on scalar fields.
  #[error("internal error: {0}")]
  Internal(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  pub fn bad_argument(field: &str, message: impl Into<String>) -> Self {
    Self::BadArgument { field: field.to_owned(), message: message.into() }
  }

  pub fn bad_syntax(field: &str, message: impl Into<String>) -> Self {
    Self::BadSyntax { field: field.to_owned(), message: message.into() }
  }

  /// Errors that must never be swallowed into a [`crate::Message`].
  pub fn is_fatal(&self) -> bool { matches!(self, Self::Internal(_)) }

  /// Errors raised by decoding or validating a single field's value.
  pub fn is_validation(&self) -> bool {
    matches!(self, Self::BadArgument { .. } | Self::BadSyntax { .. })
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
