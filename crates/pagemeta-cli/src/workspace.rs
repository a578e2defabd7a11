//! Opening the stores of a wiki data directory.

use std::{
  cell::RefCell,
  fs,
  path::{Path, PathBuf},
  rc::Rc,
};

use anyhow::Context as _;
use pagemeta_core::{
  MetadataConfig, MetadataContext, NativeDocumentStore, Resource, StoreHandle,
};
use pagemeta_frontmatter::FrontmatterStore;
use pagemeta_store_sqlite::{SqliteDatabase, SqliteSideStore};

/// Shared state for every page a command touches.
pub struct Workspace {
  context: Rc<MetadataContext>,
  db:      SqliteDatabase,
}

/// One page and its native metadata document.
pub struct Page {
  pub resource: Rc<Resource>,
  native:       Rc<RefCell<NativeDocumentStore>>,
}

impl Workspace {
  pub fn open(config: MetadataConfig) -> anyhow::Result<Self> {
    if let Some(parent) = config.database_path.parent() {
      fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = SqliteDatabase::open(&config.database_path).with_context(|| {
      format!("failed to open database at {:?}", config.database_path)
    })?;
    let context = MetadataContext::new(config).with_legacy_store(Rc::new(db.clone()));
    Ok(Self { context: Rc::new(context), db })
  }

  pub fn context(&self) -> &Rc<MetadataContext> { &self.context }

  pub fn config(&self) -> &MetadataConfig { self.context.config() }

  pub fn database(&self) -> &SqliteDatabase { &self.db }

  pub fn page(&self, path: &str) -> anyhow::Result<Page> {
    let resource = Rc::new(Resource::new(path, Rc::clone(&self.context)));
    let native = NativeDocumentStore::for_resource(&resource, &self.config().meta_dir)
      .with_context(|| format!("failed to read native metadata of {}", resource.path()))?;
    Ok(Page { resource, native: Rc::new(RefCell::new(native)) })
  }
}

impl Page {
  pub fn native(&self) -> StoreHandle { self.native.clone() }

  pub fn frontmatter(&self, pages_dir: &Path) -> anyhow::Result<FrontmatterStore> {
    FrontmatterStore::for_resource(&self.resource, pages_dir)
      .with_context(|| format!("failed to read the source of {}", self.resource.path()))
  }

  /// The relational store of this page, creating its page id if needed.
  pub fn side_store(&self, db: &SqliteDatabase) -> anyhow::Result<SqliteSideStore> {
    let page_id = self
      .resource
      .page_id(&self.native())
      .with_context(|| format!("failed to get the page id of {}", self.resource.path()))?;
    Ok(db.side_store(page_id))
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

/// Expand `~` in every configured path.
pub fn expand_paths(mut config: MetadataConfig) -> MetadataConfig {
  config.pages_dir = expand_tilde(&config.pages_dir);
  config.meta_dir = expand_tilde(&config.meta_dir);
  config.database_path = expand_tilde(&config.database_path);
  config.media_dir = config.media_dir.as_deref().map(expand_tilde);
  config
}
