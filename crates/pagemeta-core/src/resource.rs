//! The addressable page that owns metadata.

use std::{
  cell::{OnceCell, RefCell},
  collections::BTreeSet,
  path::{Path, PathBuf},
  rc::Rc,
};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result, context::MetadataContext, fields, store::StoreHandle,
};

/// Facts the wiki engine computes while rendering a page. The metadata
/// layer only consumes them, for default values.
#[derive(Debug, Clone, Default)]
pub struct RenderSummary {
  /// The generated plain-text abstract, starting with the heading text.
  pub abstract_text: Option<String>,
  /// Text of the first heading.
  pub heading:       Option<String>,
  /// Last modification time of the page source.
  pub modified:      Option<DateTime<Utc>>,
}

/// A wiki page identified by its path (`:ns:page`).
pub struct Resource {
  path:     String,
  render:   RenderSummary,
  context:  Rc<MetadataContext>,
  page_id:  OnceCell<String>,
  /// Fields of this resource currently being built.
  building: RefCell<BTreeSet<&'static str>>,
}

impl Resource {
  /// `path` may use `:` or `/` as separator, with or without a leading one.
  pub fn new(path: &str, context: Rc<MetadataContext>) -> Self {
    Self {
      path: normalize_path(path),
      render: RenderSummary::default(),
      context,
      page_id: OnceCell::new(),
      building: RefCell::default(),
    }
  }

  pub fn with_render_summary(mut self, render: RenderSummary) -> Self {
    self.render = render;
    self
  }

  pub fn path(&self) -> &str { &self.path }

  pub fn render_summary(&self) -> &RenderSummary { &self.render }

  pub fn context(&self) -> &MetadataContext { &self.context }

  /// The last path segment, e.g. `page` for `:ns:page`.
  pub fn last_segment(&self) -> &str {
    self.path.rsplit(':').next().unwrap_or(&self.path)
  }

  fn relative_file(&self, root: &Path, extension: &str) -> PathBuf {
    let mut file = root.to_path_buf();
    let mut segments = self.path.trim_start_matches(':').split(':').peekable();
    while let Some(segment) = segments.next() {
      if segments.peek().is_some() {
        file.push(segment);
      } else {
        file.push(format!("{segment}.{extension}"));
      }
    }
    file
  }

  /// `<pages_dir>/<ns>/<page>.txt`
  pub fn source_file(&self, pages_dir: &Path) -> PathBuf {
    self.relative_file(pages_dir, "txt")
  }

  /// `<meta_dir>/<ns>/<page>.meta.json`
  pub fn meta_file(&self, meta_dir: &Path) -> PathBuf {
    self.relative_file(meta_dir, "meta.json")
  }

  /// The durable page identifier, read from `native` or created and
  /// persisted there on first use.
  pub fn page_id(&self, native: &StoreHandle) -> Result<String> {
    if let Some(id) = self.page_id.get() {
      return Ok(id.clone());
    }

    let stored = native
      .borrow()
      .get(&fields::PAGE_ID)?
      .and_then(|v| v.as_str().map(str::to_owned))
      .filter(|id| !id.is_empty());

    let id = match stored {
      Some(id) => id,
      None => {
        let id = Uuid::new_v4().simple().to_string();
        tracing::debug!(path = %self.path, page_id = %id, "generated page id");
        let mut store = native.borrow_mut();
        store.set(&fields::PAGE_ID, Some(serde_json::Value::String(id.clone())))?;
        store.persist()?;
        id
      }
    };

    Ok(self.page_id.get_or_init(|| id).clone())
  }

  /// Mark `field` as being built until the guard drops. Entering a field
  /// that is already being built is a dependency cycle.
  pub(crate) fn enter_build(&self, field: &'static str) -> Result<BuildGuard<'_>> {
    if !self.building.borrow_mut().insert(field) {
      return Err(Error::Internal(format!(
        "re-entrant build of {field} on {}",
        self.path
      )));
    }
    Ok(BuildGuard { resource: self, field })
  }
}

impl std::fmt::Debug for Resource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Resource")
      .field("path", &self.path)
      .field("render", &self.render)
      .finish_non_exhaustive()
  }
}

pub(crate) struct BuildGuard<'a> {
  resource: &'a Resource,
  field:    &'static str,
}

impl Drop for BuildGuard<'_> {
  fn drop(&mut self) { self.resource.building.borrow_mut().remove(self.field); }
}

fn normalize_path(path: &str) -> String {
  let segments: Vec<&str> = path
    .split([':', '/'])
    .filter(|s| !s.is_empty())
    .collect();
  format!(":{}", segments.join(":"))
}
