//! Field registry: from a name found in a document or form to a descriptor.

use std::{collections::BTreeMap, rc::Rc};

use crate::{
  Error, Result, descriptor::MetadataDescriptor, fields, metadata::MetadataValue,
  resource::Resource,
};

#[derive(Debug, Default)]
pub struct Registry {
  fields:  Vec<&'static MetadataDescriptor>,
  names:   BTreeMap<&'static str, &'static MetadataDescriptor>,
  /// Persistent and legacy names.
  aliases: BTreeMap<&'static str, &'static MetadataDescriptor>,
  /// Tabular column names, mapped to the owning field.
  columns: BTreeMap<&'static str, &'static MetadataDescriptor>,
}

impl Registry {
  pub fn empty() -> Self { Self::default() }

  pub fn builtin() -> Self {
    let mut registry = Self::empty();
    for descriptor in fields::BUILTIN {
      registry.register(descriptor);
    }
    registry
  }

  /// Add a field. A later registration under an existing name replaces the
  /// earlier descriptor along with its legacy and column names.
  pub fn register(&mut self, descriptor: &'static MetadataDescriptor) {
    self.fields.retain(|d| d.name != descriptor.name);
    self.aliases.retain(|_, d| d.name != descriptor.name);
    self.columns.retain(|_, d| d.name != descriptor.name);
    self.fields.push(descriptor);
    self.names.insert(descriptor.name, descriptor);
    for alias in std::iter::once(descriptor.persistent_name)
      .chain(descriptor.legacy_names.iter().copied())
    {
      self.aliases.insert(alias, descriptor);
    }
    for column in descriptor.columns {
      self.columns.insert(column.name, descriptor);
    }
  }

  /// Registered fields, in registration order.
  pub fn fields(&self) -> &[&'static MetadataDescriptor] { &self.fields }

  /// Look a name up as a current name, then as a persistent or legacy name,
  /// then as a tabular column name.
  pub fn resolve(&self, name: &str) -> Result<&'static MetadataDescriptor> {
    self
      .names
      .get(name)
      .or_else(|| self.aliases.get(name))
      .or_else(|| self.columns.get(name))
      .copied()
      .ok_or_else(|| Error::NotFound(name.to_owned()))
  }

  /// A fresh, unbound value of the field answering to `name`.
  pub fn create(&self, name: &str, resource: Rc<Resource>) -> Result<MetadataValue> {
    Ok(MetadataValue::new(self.resolve(name)?, resource))
  }
}
