//! The `MetadataStore` trait and supporting types.
//!
//! A store holds the raw, persisted representation of a resource's fields
//! as JSON values. How a typed value is shaped for a given store is decided
//! by the codec from the store's [`StoreKind`]; stores themselves only key,
//! hold and flush raw values.

use std::{cell::RefCell, rc::Rc};

use serde_json::Value;

use crate::{Result, descriptor::MetadataDescriptor};

/// The kinds of backend a field can be read from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
  /// The wiki engine's per-page key/value document.
  NativeDocument,
  /// The JSON block at the head of the page source.
  Frontmatter,
  /// The SQL side store.
  Relational,
  /// A just-submitted edit form.
  FormSubmission,
}

impl StoreKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::NativeDocument => "native",
      Self::Frontmatter => "frontmatter",
      Self::Relational => "relational",
      Self::FormSubmission => "form",
    }
  }
}

/// Abstraction over a per-resource metadata backend.
pub trait MetadataStore {
  fn kind(&self) -> StoreKind;

  /// The raw persisted value of a field, `None` when absent.
  fn get(&self, descriptor: &MetadataDescriptor) -> Result<Option<Value>>;

  /// Replace the raw value of a field; `None` removes it.
  fn set(
    &mut self,
    descriptor: &MetadataDescriptor,
    value: Option<Value>,
  ) -> Result<()>;

  /// Flush pending writes. A no-op for stores without a commit phase.
  fn persist(&mut self) -> Result<()>;
}

/// A store shared by every metadata value of one resource.
pub type StoreHandle = Rc<RefCell<dyn MetadataStore>>;

/// Wrap a store into a [`StoreHandle`].
pub fn share<S: MetadataStore + 'static>(store: S) -> StoreHandle {
  Rc::new(RefCell::new(store))
}

/// Deprecated relational rows keyed by a page's canonical path. Rows are
/// read once, moved to the native store and deleted.
pub trait LegacyStore {
  /// Records (`{"path": …, "type": …}`) stored for `field` under `canonical`.
  fn select_legacy(&self, field: &str, canonical: &str) -> Result<Vec<Value>>;

  fn delete_legacy(&self, field: &str, canonical: &str) -> Result<()>;
}
