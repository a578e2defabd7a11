//! Core types for page metadata: typed values, field descriptors, the store
//! abstraction and the transfer engine that moves fields between stores.
//!
//! This crate knows the native document and form submission stores. The
//! frontmatter and SQLite stores live in their own crates and plug in
//! through [`MetadataStore`] and [`LegacyStore`].

pub mod codec;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod fields;
pub mod form;
pub mod message;
pub mod metadata;
pub mod native;
pub mod registry;
pub mod resource;
pub mod store;
pub mod tabular;
pub mod transfer;
pub mod value;

pub use context::{MetadataConfig, MetadataContext};
pub use descriptor::{DataType, DefaultRule, MetadataDescriptor, PersistenceClass};
pub use error::{Error, Result};
pub use form::FormSubmissionStore;
pub use message::{Level, Message};
pub use metadata::{BuildState, MetadataValue};
pub use native::{NativeDocument, NativeDocumentStore};
pub use registry::Registry;
pub use resource::{RenderSummary, Resource};
pub use store::{LegacyStore, MetadataStore, StoreHandle, StoreKind};
pub use tabular::{Row, Table};
pub use transfer::{Transfer, TransferInput, TransferOutcome};
pub use value::{Origin, TypedValue};

#[cfg(test)]
mod tests;
