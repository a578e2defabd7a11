//! Static, per-field descriptions of metadata.
//!
//! A [`MetadataDescriptor`] says how a field is named in memory and in
//! storage, whether it is persisted at all, which type its values have and
//! how a fallback value is derived. Descriptors are `'static` data; the
//! builtin catalogue lives in [`crate::fields`].

use crate::{
  Error, Result, context::MetadataContext, resource::Resource, tabular,
  value::TypedValue,
};

// ─── Classification ──────────────────────────────────────────────────────────

/// Whether a field is stored, or computed at render time only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceClass {
  Persistent,
  /// Never written by a transfer.
  Derived,
}

/// The shape of a field's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
  Text,
  /// Multi-line text.
  Paragraph,
  Boolean,
  Integer,
  Date,
  /// An unordered set of short tags.
  List,
  /// A list of records, see [`crate::tabular`].
  Tabular,
}

/// How a field is laid out in the native document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeShape {
  /// Stored as the bare encoded value.
  Bare,
  /// Stored as `{ <primary_key>: <value>, "origin": <tag> }`.
  Provenance { primary_key: &'static str },
}

/// How to compute a value when no store holds one.
#[derive(Debug, Clone, Copy)]
pub enum DefaultRule {
  None,
  Text(&'static str),
  Boolean(bool),
  Integer(i64),
  List(&'static [&'static str]),
  /// Derived from the resource (render summary, path, configuration).
  Computed(fn(&Resource) -> Option<TypedValue>),
  /// The value of another field of the same resource.
  Field(&'static str),
}

/// Checks a decoded value; the error string becomes a
/// [`Error::BadArgument`] message.
pub type Validator =
  fn(&TypedValue, &MetadataContext) -> std::result::Result<(), String>;

// ─── Descriptor ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct MetadataDescriptor {
  /// Canonical field name.
  pub name:            &'static str,
  /// Key used by the native document and frontmatter stores.
  pub persistent_name: &'static str,
  /// Former names still found in old documents.
  pub legacy_names:    &'static [&'static str],
  /// Human-readable label for forms.
  pub label:           &'static str,
  pub persistence:     PersistenceClass,
  /// Whether end users may edit the field.
  pub mutable:         bool,
  pub data_type:       DataType,
  pub default_rule:    DefaultRule,
  pub native_shape:    NativeShape,
  pub validate:        Option<Validator>,
  /// Tabular only. The first column is the record key.
  pub columns:         &'static [&'static MetadataDescriptor],
  /// Rows of this field may still sit in the deprecated relational table.
  pub legacy_rows:     bool,
}

impl MetadataDescriptor {
  /// Field values shared by most descriptors; override with struct update
  /// syntax.
  pub const BASE: MetadataDescriptor = MetadataDescriptor {
    name:            "",
    persistent_name: "",
    legacy_names:    &[],
    label:           "",
    persistence:     PersistenceClass::Persistent,
    mutable:         true,
    data_type:       DataType::Text,
    default_rule:    DefaultRule::None,
    native_shape:    NativeShape::Bare,
    validate:        None,
    columns:         &[],
    legacy_rows:     false,
  };

  pub fn is_derived(&self) -> bool {
    self.persistence == PersistenceClass::Derived
  }

  pub fn is_tabular(&self) -> bool { self.data_type == DataType::Tabular }

  /// The key column of a tabular field.
  pub fn key_column(&self) -> Result<&'static MetadataDescriptor> {
    self.columns.first().copied().ok_or_else(|| {
      Error::Internal(format!("{} has no key column", self.name))
    })
  }

  /// Non-key columns of a tabular field.
  pub fn attribute_columns(&self) -> &'static [&'static MetadataDescriptor] {
    self.columns.get(1..).unwrap_or(&[])
  }

  /// Keys a document store should try, persistent name first.
  pub fn storage_keys(&self) -> Vec<&'static str> {
    let mut keys = vec![self.persistent_name];
    for key in std::iter::once(self.name).chain(self.legacy_names.iter().copied())
    {
      if !keys.contains(&key) {
        keys.push(key);
      }
    }
    keys
  }

  /// Run the field validator, if any.
  pub fn check(&self, value: &TypedValue, context: &MetadataContext) -> Result<()> {
    if !value.fits(self.data_type) {
      return Err(Error::bad_argument(
        self.name,
        format!("expected a {:?} value, got {value:?}", self.data_type),
      ));
    }
    if let TypedValue::Table(table) = value {
      tabular::check(self, table, context)?;
    }
    match self.validate {
      Some(validate) => {
        validate(value, context).map_err(|m| Error::bad_argument(self.name, m))
      }
      None => Ok(()),
    }
  }
}

impl PartialEq for MetadataDescriptor {
  fn eq(&self, other: &Self) -> bool { self.name == other.name }
}

impl Eq for MetadataDescriptor {}

#[cfg(test)]
mod tests {
  use crate::fields;

  #[test]
  fn storage_keys_put_persistent_name_first_without_duplicates() {
    assert_eq!(fields::ALIASES.storage_keys(), vec![
      "aliases",
      "alias",
      "redirects"
    ]);
    assert_eq!(fields::LANG.storage_keys(), vec!["lang"]);
  }

  #[test]
  fn key_column_of_scalar_field_is_an_internal_error() {
    let err = fields::TITLE.key_column().unwrap_err();
    assert!(err.is_fatal());
  }
}
