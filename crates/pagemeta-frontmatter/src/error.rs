//! Error types for the frontmatter store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("frontmatter must be a JSON object")]
  NotAnObject,

  #[error("frontmatter block opened but never closed")]
  Unterminated,

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for pagemeta_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Io(e) => Self::Io(e),
      other => Self::Store(Box::new(other)),
    }
  }
}
