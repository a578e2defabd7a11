//! SQLite side store for page metadata.
//!
//! Aliases get a table keyed by `(page_id, path)`; every other field is kept
//! as JSON text in a generic attribute table. The database also exposes the
//! deprecated, canonical-keyed alias table to the one-time migration as a
//! [`pagemeta_core::LegacyStore`].

mod encode;
mod schema;
mod store;

pub mod error;

pub use encode::RawAlias;
pub use error::{Error, Result};
pub use store::{SqliteDatabase, SqliteSideStore};
