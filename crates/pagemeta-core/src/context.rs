//! Process-wide configuration and shared lookup data.
//!
//! A [`MetadataContext`] is built once and handed to every [`Resource`]
//! through an `Rc`. It replaces what would otherwise be global state: the
//! field registry, the vocabularies used by validators and the handle on the
//! deprecated relational table.
//!
//! [`Resource`]: crate::resource::Resource

use std::{collections::BTreeSet, path::PathBuf, rc::Rc};

use serde::Deserialize;

use crate::{registry::Registry, store::LegacyStore};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `pagemeta.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
  /// Root of the page sources (`<ns>/<page>.txt`).
  pub pages_dir:     PathBuf,
  /// Root of the native metadata documents (`<ns>/<page>.meta.json`).
  pub meta_dir:      PathBuf,
  /// SQLite side store.
  pub database_path: PathBuf,
  /// When set, image paths must exist below this directory.
  pub media_dir:     Option<PathBuf>,
  pub default_lang:  String,
  pub alias_types:   Vec<String>,
  pub image_usages:  Vec<String>,
}

impl Default for MetadataConfig {
  fn default() -> Self {
    Self {
      pages_dir:     PathBuf::from("data/pages"),
      meta_dir:      PathBuf::from("data/meta"),
      database_path: PathBuf::from("data/pagemeta.sqlite"),
      media_dir:     None,
      default_lang:  "en".to_owned(),
      alias_types:   ["synonym", "redirect", "permanent"]
        .map(str::to_owned)
        .to_vec(),
      image_usages:  ["all", "social", "facebook", "twitter", "google", "icon"]
        .map(str::to_owned)
        .to_vec(),
    }
  }
}

// ─── Dictionaries ────────────────────────────────────────────────────────────

/// Closed vocabularies consulted by validators.
#[derive(Debug, Clone, Default)]
pub struct Dictionaries {
  pub alias_types:  BTreeSet<String>,
  pub image_usages: BTreeSet<String>,
}

impl Dictionaries {
  fn from_config(config: &MetadataConfig) -> Self {
    Self {
      alias_types:  config.alias_types.iter().cloned().collect(),
      image_usages: config.image_usages.iter().cloned().collect(),
    }
  }
}

// ─── Context ─────────────────────────────────────────────────────────────────

pub struct MetadataContext {
  config:       MetadataConfig,
  dictionaries: Dictionaries,
  registry:     Registry,
  legacy:       Option<Rc<dyn LegacyStore>>,
}

impl MetadataContext {
  /// A context with the builtin field registry.
  pub fn new(config: MetadataConfig) -> Self {
    let dictionaries = Dictionaries::from_config(&config);
    Self { config, dictionaries, registry: Registry::builtin(), legacy: None }
  }

  /// Attach the store holding deprecated rows to migrate on first read.
  pub fn with_legacy_store(mut self, legacy: Rc<dyn LegacyStore>) -> Self {
    self.legacy = Some(legacy);
    self
  }

  pub fn config(&self) -> &MetadataConfig { &self.config }

  pub fn dictionaries(&self) -> &Dictionaries { &self.dictionaries }

  pub fn registry(&self) -> &Registry { &self.registry }

  pub fn registry_mut(&mut self) -> &mut Registry { &mut self.registry }

  pub fn legacy_store(&self) -> Option<&Rc<dyn LegacyStore>> {
    self.legacy.as_ref()
  }
}

impl Default for MetadataContext {
  fn default() -> Self { Self::new(MetadataConfig::default()) }
}

impl std::fmt::Debug for MetadataContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MetadataContext")
      .field("config", &self.config)
      .field("legacy", &self.legacy.is_some())
      .finish_non_exhaustive()
  }
}
