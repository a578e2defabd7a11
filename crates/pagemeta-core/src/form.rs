//! [`FormSubmissionStore`]: the fields of a just-submitted edit form.
//!
//! Entries keep their submission order. Scalar fields are submitted under
//! their canonical name; a tabular field is submitted as one parallel array
//! per column, under the column names.

use serde_json::{Map, Value};

use crate::{
  Result,
  descriptor::MetadataDescriptor,
  store::{MetadataStore, StoreKind},
};

#[derive(Debug, Clone, Default)]
pub struct FormSubmissionStore {
  entries: Vec<(String, Value)>,
}

impl FormSubmissionStore {
  pub fn new() -> Self { Self::default() }

  /// Add or replace a submitted entry.
  pub fn insert(&mut self, key: impl Into<String>, value: Value) {
    let key = key.into();
    match self.entries.iter_mut().find(|(k, _)| *k == key) {
      Some(entry) => entry.1 = value,
      None => self.entries.push((key, value)),
    }
  }

  pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
    self.insert(key, value);
    self
  }

  /// Submitted keys, in submission order.
  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|(k, _)| k.as_str())
  }

  pub fn entry(&self, key: &str) -> Option<&Value> {
    self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
  }

  fn remove(&mut self, key: &str) { self.entries.retain(|(k, _)| k != key); }

  fn form_keys(descriptor: &MetadataDescriptor) -> Vec<&'static str> {
    let mut keys = vec![descriptor.name];
    for key in descriptor.storage_keys() {
      if !keys.contains(&key) {
        keys.push(key);
      }
    }
    keys
  }
}

impl FromIterator<(String, Value)> for FormSubmissionStore {
  fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
    let mut store = Self::new();
    for (key, value) in iter {
      store.insert(key, value);
    }
    store
  }
}

impl MetadataStore for FormSubmissionStore {
  fn kind(&self) -> StoreKind { StoreKind::FormSubmission }

  fn get(&self, descriptor: &MetadataDescriptor) -> Result<Option<Value>> {
    if descriptor.is_tabular() {
      let columns: Map<String, Value> = descriptor
        .columns
        .iter()
        .filter_map(|c| self.entry(c.name).map(|v| (c.name.to_owned(), v.clone())))
        .collect();
      return Ok((!columns.is_empty()).then_some(Value::Object(columns)));
    }
    Ok(
      Self::form_keys(descriptor)
        .into_iter()
        .find_map(|k| self.entry(k))
        .cloned(),
    )
  }

  fn set(&mut self, descriptor: &MetadataDescriptor, value: Option<Value>) -> Result<()> {
    if descriptor.is_tabular() {
      for column in descriptor.columns {
        self.remove(column.name);
      }
      if let Some(Value::Object(columns)) = value {
        for (column, cells) in columns {
          self.insert(column, cells);
        }
      }
      return Ok(());
    }
    for key in Self::form_keys(descriptor) {
      self.remove(key);
    }
    if let Some(value) = value {
      self.insert(descriptor.name, value);
    }
    Ok(())
  }

  fn persist(&mut self) -> Result<()> { Ok(()) }
}
