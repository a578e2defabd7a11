//! [`NativeDocumentStore`]: the wiki engine's own per-page metadata file.
//!
//! The document has two sections: `persistent` holds what users and plugins
//! set, `current` holds everything including what the engine computes while
//! rendering. Persistent fields are written to both sections; derived
//! fields only ever live in `current`.

use std::{
  fs,
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
  Result,
  descriptor::MetadataDescriptor,
  resource::Resource,
  store::{MetadataStore, StoreKind},
};

/// On-disk shape of a native metadata file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NativeDocument {
  #[serde(default)]
  pub persistent: Map<String, Value>,
  #[serde(default)]
  pub current:    Map<String, Value>,
}

#[derive(Debug, Default)]
pub struct NativeDocumentStore {
  file:     Option<PathBuf>,
  document: NativeDocument,
  dirty:    bool,
}

impl NativeDocumentStore {
  /// A store that is never written to disk, for tests.
  pub fn in_memory() -> Self { Self::default() }

  /// Load the document at `file`; a missing or empty file is an empty
  /// document.
  pub fn open(file: impl Into<PathBuf>) -> Result<Self> {
    let file = file.into();
    let document = match fs::read_to_string(&file) {
      Ok(text) if text.trim().is_empty() => NativeDocument::default(),
      Ok(text) => serde_json::from_str(&text)?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => NativeDocument::default(),
      Err(e) => return Err(e.into()),
    };
    Ok(Self { file: Some(file), document, dirty: false })
  }

  /// The document of `resource` below `meta_dir`.
  pub fn for_resource(resource: &Resource, meta_dir: &Path) -> Result<Self> {
    Self::open(resource.meta_file(meta_dir))
  }

  pub fn from_document(document: NativeDocument) -> Self {
    Self { file: None, document, dirty: false }
  }

  pub fn document(&self) -> &NativeDocument { &self.document }

  pub fn file(&self) -> Option<&Path> { self.file.as_deref() }
}

fn lookup(section: &Map<String, Value>, keys: &[&str]) -> Option<Value> {
  keys.iter().find_map(|k| section.get(*k)).cloned()
}

impl MetadataStore for NativeDocumentStore {
  fn kind(&self) -> StoreKind { StoreKind::NativeDocument }

  fn get(&self, descriptor: &MetadataDescriptor) -> Result<Option<Value>> {
    let keys = descriptor.storage_keys();
    if descriptor.is_derived() {
      return Ok(lookup(&self.document.current, &keys));
    }
    Ok(
      lookup(&self.document.persistent, &keys)
        .or_else(|| lookup(&self.document.current, &keys)),
    )
  }

  fn set(&mut self, descriptor: &MetadataDescriptor, value: Option<Value>) -> Result<()> {
    let keys = descriptor.storage_keys();
    let sections = [
      (&mut self.document.persistent, !descriptor.is_derived()),
      (&mut self.document.current, true),
    ];
    for (section, applies) in sections {
      if !applies {
        continue;
      }
      for key in &keys {
        section.remove(*key);
      }
      if let Some(value) = &value {
        section.insert(descriptor.persistent_name.to_owned(), value.clone());
      }
    }
    self.dirty = true;
    Ok(())
  }

  fn persist(&mut self) -> Result<()> {
    let Some(file) = &self.file else {
      self.dirty = false;
      return Ok(());
    };
    if !self.dirty {
      return Ok(());
    }
    if let Some(parent) = file.parent() {
      fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(&self.document)?;
    let staging = file.with_extension("json.tmp");
    fs::write(&staging, text)?;
    fs::rename(&staging, file)?;
    self.dirty = false;
    tracing::debug!(file = %file.display(), "wrote native metadata");
    Ok(())
  }
}
