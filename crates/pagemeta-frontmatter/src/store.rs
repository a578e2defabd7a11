use std::{
  fs,
  path::{Path, PathBuf},
};

use pagemeta_core::{MetadataDescriptor, MetadataStore, Resource, StoreKind};
use serde_json::{Map, Value};

use crate::{Result, parse, serialize};

/// The frontmatter block of one page source, as a metadata store.
///
/// Writes only touch the in-memory block; [`MetadataStore::persist`]
/// rewrites the page file, and only when its text would change.
#[derive(Debug, Default)]
pub struct FrontmatterStore {
  file:     Option<PathBuf>,
  /// The page text as last read or written.
  original: String,
  block:    Map<String, Value>,
  body:     String,
}

impl FrontmatterStore {
  /// A store over `source` that is never written to disk.
  pub fn from_source(source: &str) -> Result<Self> {
    let (block, body) = parse::parse(source)?;
    Ok(Self {
      file: None,
      original: source.to_owned(),
      block,
      body: body.to_owned(),
    })
  }

  /// Read the page at `file`; a missing file is an empty page.
  pub fn open(file: impl Into<PathBuf>) -> Result<Self> {
    let file = file.into();
    let source = match fs::read_to_string(&file) {
      Ok(source) => source,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
      Err(e) => return Err(e.into()),
    };
    let mut store = Self::from_source(&source)?;
    store.file = Some(file);
    Ok(store)
  }

  /// The source of `resource` below `pages_dir`.
  pub fn for_resource(resource: &Resource, pages_dir: &Path) -> Result<Self> {
    Self::open(resource.source_file(pages_dir))
  }

  pub fn block(&self) -> &Map<String, Value> { &self.block }

  pub fn body(&self) -> &str { &self.body }

  pub fn file(&self) -> Option<&Path> { self.file.as_deref() }

  /// Keys present in the block, sorted.
  pub fn keys(&self) -> impl Iterator<Item = &str> { self.block.keys().map(String::as_str) }

  /// The page text with the current block.
  pub fn to_source(&self) -> String { serialize::render(&self.block, &self.body) }

  /// Whether [`to_source`](Self::to_source) differs from the text last read
  /// or written.
  pub fn is_changed(&self) -> bool { self.to_source() != self.original }

  fn write(&mut self) -> Result<()> {
    let source = self.to_source();
    if source == self.original {
      return Ok(());
    }
    if let Some(file) = &self.file {
      if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)?;
      }
      let staging = file.with_extension("txt.tmp");
      fs::write(&staging, &source)?;
      fs::rename(&staging, file)?;
      tracing::debug!(file = %file.display(), keys = self.block.len(), "rewrote frontmatter");
    }
    self.original = source;
    Ok(())
  }
}

impl MetadataStore for FrontmatterStore {
  fn kind(&self) -> StoreKind { StoreKind::Frontmatter }

  fn get(&self, descriptor: &MetadataDescriptor) -> pagemeta_core::Result<Option<Value>> {
    Ok(
      descriptor
        .storage_keys()
        .into_iter()
        .find_map(|k| self.block.get(k))
        .cloned(),
    )
  }

  fn set(
    &mut self,
    descriptor: &MetadataDescriptor,
    value: Option<Value>,
  ) -> pagemeta_core::Result<()> {
    for key in descriptor.storage_keys() {
      self.block.remove(key);
    }
    if let Some(value) = value {
      self.block.insert(descriptor.persistent_name.to_owned(), value);
    }
    Ok(())
  }

  fn persist(&mut self) -> pagemeta_core::Result<()> { Ok(self.write()?) }
}
