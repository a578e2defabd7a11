//! Error type for `pagemeta-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A raw value whose shape the relational tables cannot hold.
  #[error("cannot store {field}: {message}")]
  UnsupportedValue { field: String, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for pagemeta_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Io(e) => Self::Io(e),
      Error::Json(e) => Self::Json(e),
      other => Self::Store(Box::new(other)),
    }
  }
}
