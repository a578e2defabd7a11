//! Tabular metadata: fields whose value is a list of records.
//!
//! Each record is keyed by its first column (an alias path, an image path)
//! and carries one attribute per remaining column. Persisted documents have
//! accumulated three shapes over time, all of which decode to the same
//! [`Table`]:
//!
//! - a list of records: `[{"path": ":a", "type": "redirect"}, ":b"]`
//! - a map keyed by record key: `{":a": {"type": "redirect"}}`
//! - a single bare key: `":a"`
//!
//! Encoding always emits the list shape, sorted by key, without attributes
//! equal to their column default. Form submissions instead carry one
//! parallel array per column.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{
  Error, Result, codec,
  context::MetadataContext,
  descriptor::{DefaultRule, MetadataDescriptor},
  metadata::MetadataValue,
  store::StoreKind,
  value::TypedValue,
};

// ─── Row / Table ─────────────────────────────────────────────────────────────

/// One record: its key and its attributes, by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
  pub key:   String,
  pub attrs: BTreeMap<String, TypedValue>,
}

impl Row {
  pub fn new(key: impl Into<String>) -> Self {
    Self { key: key.into(), attrs: BTreeMap::new() }
  }

  pub fn with(mut self, column: &str, value: TypedValue) -> Self {
    self.attrs.insert(column.to_owned(), value);
    self
  }

  pub fn get(&self, column: &str) -> Option<&TypedValue> { self.attrs.get(column) }

  /// Fill attributes missing from this row with their column default. An
  /// empty attribute counts as missing.
  fn fill_defaults(&mut self, descriptor: &MetadataDescriptor) {
    self.attrs.retain(|_, value| !value.is_empty());
    for column in descriptor.attribute_columns() {
      if !self.attrs.contains_key(column.name)
        && let Some(default) = column_default(column)
      {
        self.attrs.insert(column.name.to_owned(), default);
      }
    }
  }
}

/// Rows in insertion order, unique by key. Equality ignores order.
#[derive(Debug, Clone, Default)]
pub struct Table {
  rows: Vec<Row>,
}

impl Table {
  pub fn new() -> Self { Self::default() }

  pub fn rows(&self) -> &[Row] { &self.rows }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  pub fn get(&self, key: &str) -> Option<&Row> {
    self.rows.iter().find(|r| r.key == key)
  }

  /// Insert `row`, replacing in place any row with the same key. Returns the
  /// replaced row.
  pub fn upsert(&mut self, row: Row) -> Option<Row> {
    match self.rows.iter_mut().find(|r| r.key == row.key) {
      Some(existing) => Some(std::mem::replace(existing, row)),
      None => {
        self.rows.push(row);
        None
      }
    }
  }

  pub fn remove(&mut self, key: &str) -> Option<Row> {
    let index = self.rows.iter().position(|r| r.key == key)?;
    Some(self.rows.remove(index))
  }

  fn sorted(&self) -> Vec<&Row> {
    let mut rows: Vec<&Row> = self.rows.iter().collect();
    rows.sort_by(|a, b| a.key.cmp(&b.key));
    rows
  }
}

impl PartialEq for Table {
  fn eq(&self, other: &Self) -> bool { self.sorted() == other.sorted() }
}

impl FromIterator<Row> for Table {
  fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
    let mut table = Table::new();
    for row in iter {
      table.upsert(row);
    }
    table
  }
}

/// The static default of a column, if it has one.
pub fn column_default(column: &MetadataDescriptor) -> Option<TypedValue> {
  match column.default_rule {
    DefaultRule::Text(s) => Some(TypedValue::text(s)),
    DefaultRule::Boolean(b) => Some(TypedValue::Boolean(b)),
    DefaultRule::Integer(i) => Some(TypedValue::Integer(i)),
    DefaultRule::List(items) => Some(TypedValue::list(items.iter().copied())),
    DefaultRule::None | DefaultRule::Computed(_) | DefaultRule::Field(_) => None,
  }
}

// ─── Decoding ────────────────────────────────────────────────────────────────

pub(crate) fn decode(
  descriptor: &MetadataDescriptor,
  raw: &Value,
  kind: StoreKind,
) -> Result<Table> {
  if kind == StoreKind::FormSubmission {
    return decode_columns(descriptor, raw);
  }

  let mut table = Table::new();
  match raw {
    Value::Null => {}
    Value::Array(items) => {
      for item in items {
        let row = match item {
          Value::Object(record) => decode_record(descriptor, None, record, kind)?,
          Value::String(key) => bare_row(descriptor, key),
          Value::Null => None,
          other => {
            return Err(Error::bad_syntax(
              descriptor.name,
              format!("unexpected record {other}"),
            ));
          }
        };
        if let Some(row) = row {
          table.upsert(row);
        }
      }
    }
    Value::Object(by_key) => {
      for (key, attrs) in by_key {
        let row = match attrs {
          Value::Object(record) => {
            decode_record(descriptor, Some(key), record, kind)?
          }
          Value::Null => bare_row(descriptor, key),
          // `{":a": "redirect"}` when the field has a single attribute.
          scalar if descriptor.attribute_columns().len() == 1 => {
            let column = descriptor.attribute_columns()[0];
            let mut record = Map::new();
            record.insert(column.persistent_name.to_owned(), scalar.clone());
            decode_record(descriptor, Some(key), &record, kind)?
          }
          other => {
            return Err(Error::bad_syntax(
              descriptor.name,
              format!("unexpected attributes for {key:?}: {other}"),
            ));
          }
        };
        if let Some(row) = row {
          table.upsert(row);
        }
      }
    }
    Value::String(key) => {
      if let Some(row) = bare_row(descriptor, key) {
        table.upsert(row);
      }
    }
    other => {
      return Err(Error::bad_syntax(
        descriptor.name,
        format!("expected records, got {other}"),
      ));
    }
  }
  Ok(table)
}

fn bare_row(descriptor: &MetadataDescriptor, key: &str) -> Option<Row> {
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let mut row = Row::new(key);
  row.fill_defaults(descriptor);
  Some(row)
}

fn lookup<'a>(column: &MetadataDescriptor, record: &'a Map<String, Value>) -> Option<&'a Value> {
  column.storage_keys().into_iter().find_map(|k| record.get(k))
}

fn decode_record(
  descriptor: &MetadataDescriptor,
  key: Option<&str>,
  record: &Map<String, Value>,
  kind: StoreKind,
) -> Result<Option<Row>> {
  let key_column = descriptor.key_column()?;
  let key = match key {
    Some(key) => key.to_owned(),
    None => match lookup(key_column, record) {
      Some(Value::String(key)) => key.clone(),
      None | Some(Value::Null) => return Ok(None),
      Some(other) => {
        return Err(Error::bad_syntax(
          descriptor.name,
          format!("record key must be a string, got {other}"),
        ));
      }
    },
  };
  let key = key.trim();
  if key.is_empty() {
    return Ok(None);
  }

  let mut row = Row::new(key);
  for column in descriptor.attribute_columns() {
    if let Some(raw) = lookup(column, record)
      && let Some(value) = codec::decode(column, raw, kind)?
    {
      row.attrs.insert(column.name.to_owned(), value);
    }
  }
  row.fill_defaults(descriptor);
  Ok(Some(row))
}

/// Zip the parallel per-column arrays of a form submission into rows.
fn decode_columns(descriptor: &MetadataDescriptor, raw: &Value) -> Result<Table> {
  let Value::Object(columns) = raw else {
    return Err(Error::bad_syntax(
      descriptor.name,
      format!("expected form columns, got {raw}"),
    ));
  };
  let as_array = |value: &Value| -> Vec<Value> {
    match value {
      Value::Array(items) => items.clone(),
      Value::Null => Vec::new(),
      scalar => vec![scalar.clone()],
    }
  };

  let key_column = descriptor.key_column()?;
  let keys = columns.get(key_column.name).map(as_array).unwrap_or_default();

  let mut attribute_cells = Vec::new();
  for column in descriptor.attribute_columns() {
    let Some(cells) = columns.get(column.name).map(as_array) else {
      continue;
    };
    if cells.len() != keys.len() {
      return Err(Error::Internal(format!(
        "form column {} has {} entries but {} has {}",
        column.name,
        cells.len(),
        key_column.name,
        keys.len()
      )));
    }
    attribute_cells.push((*column, cells));
  }

  let mut table = Table::new();
  for (index, key) in keys.iter().enumerate() {
    let key = match key {
      Value::String(s) => s.trim(),
      Value::Null => "",
      other => {
        return Err(Error::bad_syntax(
          descriptor.name,
          format!("record key must be a string, got {other}"),
        ));
      }
    };
    if key.is_empty() {
      continue;
    }
    let mut row = Row::new(key);
    for (column, cells) in &attribute_cells {
      if let Some(value) =
        codec::decode(column, &cells[index], StoreKind::FormSubmission)?
      {
        row.attrs.insert(column.name.to_owned(), value);
      }
    }
    row.fill_defaults(descriptor);
    table.upsert(row);
  }
  Ok(table)
}

// ─── Encoding ────────────────────────────────────────────────────────────────

pub(crate) fn encode(
  descriptor: &MetadataDescriptor,
  table: &Table,
  kind: StoreKind,
) -> Result<Option<Value>> {
  if table.is_empty() {
    return Ok(None);
  }
  let key_column = descriptor.key_column()?;
  let rows = table.sorted();

  if kind == StoreKind::FormSubmission {
    let mut columns = Map::new();
    columns.insert(
      key_column.name.to_owned(),
      Value::Array(rows.iter().map(|r| Value::String(r.key.clone())).collect()),
    );
    for column in descriptor.attribute_columns() {
      let cells = rows
        .iter()
        .map(|r| match r.get(column.name) {
          Some(value) => codec::encode_scalar(value, kind),
          None => Value::String(String::new()),
        })
        .collect();
      columns.insert(column.name.to_owned(), Value::Array(cells));
    }
    return Ok(Some(Value::Object(columns)));
  }

  let records = rows
    .into_iter()
    .map(|row| {
      let mut record = Map::new();
      record.insert(
        key_column.persistent_name.to_owned(),
        Value::String(row.key.clone()),
      );
      for column in descriptor.attribute_columns() {
        let Some(value) = row.get(column.name) else { continue };
        if column_default(column).as_ref() == Some(value) || value.is_empty() {
          continue;
        }
        record.insert(
          column.persistent_name.to_owned(),
          codec::encode_scalar(value, kind),
        );
      }
      Value::Object(record)
    })
    .collect();
  Ok(Some(Value::Array(records)))
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Validate every cell of every row against its column.
pub(crate) fn check(
  descriptor: &MetadataDescriptor,
  table: &Table,
  context: &MetadataContext,
) -> Result<()> {
  let key_column = descriptor.key_column()?;
  for row in table.rows() {
    key_column.check(&TypedValue::Text(row.key.clone()), context)?;
    for column in descriptor.attribute_columns() {
      if let Some(value) = row.get(column.name) {
        column.check(value, context)?;
      }
    }
  }
  Ok(())
}

// ─── Tabular operations ──────────────────────────────────────────────────────

impl MetadataValue {
  fn require_tabular(&self) -> Result<()> {
    if self.descriptor.is_tabular() {
      Ok(())
    } else {
      Err(Error::Internal(format!(
        "{} is not a tabular field",
        self.descriptor.name
      )))
    }
  }

  fn current_table(&mut self) -> Result<Table> {
    self.ensure_built()?;
    Ok(match &self.value {
      Some(TypedValue::Table(table)) => table.clone(),
      _ => Table::new(),
    })
  }

  /// The current rows, in insertion order.
  pub fn rows(&mut self) -> Result<Vec<Row>> {
    self.require_tabular()?;
    Ok(self.current_table()?.rows().to_vec())
  }

  /// Insert or replace the record keyed by `key` and write the field
  /// through to the write store.
  pub fn add<I, S>(&mut self, key: &str, attrs: I) -> Result<()>
  where
    I: IntoIterator<Item = (S, TypedValue)>,
    S: Into<String>,
  {
    self.require_tabular()?;
    let mut table = self.current_table()?;

    let mut row = Row::new(key.trim());
    for (column, value) in attrs {
      let column = column.into();
      if !self.descriptor.attribute_columns().iter().any(|c| c.name == column) {
        return Err(Error::bad_argument(
          self.descriptor.name,
          format!("unknown column {column:?}"),
        ));
      }
      row.attrs.insert(column, value);
    }
    row.fill_defaults(self.descriptor);
    if row.key.is_empty() {
      return Err(Error::bad_argument(self.descriptor.name, "record key is empty"));
    }

    table.upsert(row);
    let value = TypedValue::Table(table);
    self.descriptor.check(&value, self.resource.context())?;
    self.replace_value(Some(value));
    self.send_to_write_store()
  }

  /// Remove the record keyed by `key`, writing the field through to the
  /// write store when a record was removed.
  pub fn remove(&mut self, key: &str) -> Result<Option<Row>> {
    self.require_tabular()?;
    let mut table = self.current_table()?;
    let removed = table.remove(key);
    if removed.is_some() {
      self.replace_value(Some(TypedValue::Table(table)).filter(|v| !v.is_empty()));
      self.send_to_write_store()?;
    }
    Ok(removed)
  }
}

#[cfg(test)]
mod tests {
  use std::rc::Rc;

  use serde_json::json;

  use super::*;
  use crate::{NativeDocumentStore, Resource, fields, store::share};

  fn alias(key: &str, kind: &str) -> Row {
    Row::new(key).with("alias_type", TypedValue::text(kind))
  }

  fn decode_aliases(raw: Value) -> Table {
    decode(&fields::ALIASES, &raw, StoreKind::NativeDocument).unwrap()
  }

  #[test]
  fn all_legacy_shapes_decode_to_the_same_table() {
    let expected: Table = [alias(":a", "redirect"), alias(":b", "synonym")]
      .into_iter()
      .collect();

    let list = decode_aliases(json!([
      {"path": ":b"},
      {"path": ":a", "type": "redirect"}
    ]));
    let map = decode_aliases(json!({
      ":a": {"type": "redirect"},
      ":b": null
    }));
    let map_of_scalars = decode_aliases(json!({":a": "redirect", ":b": "synonym"}));

    assert_eq!(list, expected);
    assert_eq!(map, expected);
    assert_eq!(map_of_scalars, expected);

    let single = decode_aliases(json!(":b"));
    assert_eq!(single, [alias(":b", "synonym")].into_iter().collect());
  }

  #[test]
  fn duplicate_keys_keep_the_last_record_in_first_position() {
    let table = decode_aliases(json!([
      {"path": ":a", "type": "redirect"},
      {"path": ":b"},
      {"path": ":a", "type": "permanent"}
    ]));
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows()[0], alias(":a", "permanent"));
  }

  #[test]
  fn encoding_sorts_and_omits_defaults() {
    let table: Table = [alias(":b", "synonym"), alias(":a", "redirect")]
      .into_iter()
      .collect();
    let raw = encode(&fields::ALIASES, &table, StoreKind::Frontmatter).unwrap();
    assert_eq!(
      raw,
      Some(json!([{"path": ":a", "type": "redirect"}, {"path": ":b"}]))
    );
    assert_eq!(decode(&fields::ALIASES, &raw.unwrap(), StoreKind::Frontmatter).unwrap(), table);
  }

  #[test]
  fn form_columns_round_trip() {
    let table: Table = [
      Row::new(":img/logo.png").with("image_usage", TypedValue::list(["social", "icon"])),
      Row::new(":img/banner.png").with("image_usage", TypedValue::list(["all"])),
    ]
    .into_iter()
    .collect();
    let raw = encode(&fields::IMAGES, &table, StoreKind::FormSubmission)
      .unwrap()
      .unwrap();
    assert_eq!(
      raw["image_path"],
      json!([":img/banner.png", ":img/logo.png"])
    );
    assert_eq!(decode(&fields::IMAGES, &raw, StoreKind::FormSubmission).unwrap(), table);
  }

  #[test]
  fn form_columns_skip_blank_keys() {
    let raw = json!({
      "alias_path": ["/a", "", "/b"],
      "alias_type": ["redirect", "redirect", "permanent"]
    });
    let table = decode(&fields::ALIASES, &raw, StoreKind::FormSubmission).unwrap();
    assert_eq!(table, [alias("/a", "redirect"), alias("/b", "permanent")]
      .into_iter()
      .collect());
  }

  #[test]
  fn mismatched_form_columns_are_fatal() {
    let raw = json!({
      "alias_path": ["/a", "/b"],
      "alias_type": ["redirect"]
    });
    let err = decode(&fields::ALIASES, &raw, StoreKind::FormSubmission).unwrap_err();
    assert!(err.is_fatal());
  }

  #[test]
  fn empty_attributes_take_the_column_default() {
    let resource = Rc::new(Resource::new(":page", Rc::new(MetadataContext::default())));
    let store = share(NativeDocumentStore::in_memory());

    let mut images = MetadataValue::new(&fields::IMAGES, Rc::clone(&resource)).with_store(store.clone());
    images.add(":img.png", [("image_usage", TypedValue::List(Vec::new()))]).unwrap();
    let written = images.rows().unwrap();
    assert_eq!(written, vec![
      Row::new(":img.png").with("image_usage", TypedValue::list(["all"]))
    ]);

    let mut fresh = MetadataValue::new(&fields::IMAGES, resource).with_store(store);
    assert_eq!(fresh.rows().unwrap(), written);
  }

  #[test]
  fn upsert_replaces_in_place() {
    let mut table: Table = [alias(":a", "synonym"), alias(":b", "synonym")]
      .into_iter()
      .collect();
    let previous = table.upsert(alias(":a", "redirect"));
    assert_eq!(previous, Some(alias(":a", "synonym")));
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows()[0].key, ":a");
    assert_eq!(table.rows()[1].key, ":b");
  }
}
