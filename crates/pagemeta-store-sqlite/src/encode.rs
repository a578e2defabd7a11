//! Conversions between relational raw values and SQLite rows.
//!
//! Alias records travel as `{"path": …, "type": …}` objects, the relational
//! shape produced by the core codec; a missing `type` is stored as `NULL`.
//! Every other field is stored as compact JSON text.

use serde_json::{Map, Value};

use crate::{Error, Result};

const PATH: &str = "path";
const TYPE: &str = "type";

/// Raw strings read directly from a `page_aliases` or
/// `deprecated_page_aliases` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAlias {
  pub path:       String,
  pub alias_type: Option<String>,
}

impl RawAlias {
  pub fn new(path: impl Into<String>, alias_type: Option<&str>) -> Self {
    Self { path: path.into(), alias_type: alias_type.map(str::to_owned) }
  }

  pub fn into_record(self) -> Value {
    let mut record = Map::new();
    record.insert(PATH.to_owned(), Value::String(self.path));
    if let Some(alias_type) = self.alias_type {
      record.insert(TYPE.to_owned(), Value::String(alias_type));
    }
    Value::Object(record)
  }

  pub fn from_record(field: &str, record: &Value) -> Result<Self> {
    let unsupported = |message: String| Error::UnsupportedValue {
      field: field.to_owned(),
      message,
    };
    let Value::Object(record) = record else {
      return Err(unsupported(format!("expected a record, got {record}")));
    };
    let path = match record.get(PATH) {
      Some(Value::String(path)) if !path.trim().is_empty() => path.trim().to_owned(),
      other => return Err(unsupported(format!("bad alias path {other:?}"))),
    };
    let alias_type = match record.get(TYPE) {
      None | Some(Value::Null) => None,
      Some(Value::String(t)) => Some(t.clone()),
      Some(other) => return Err(unsupported(format!("bad alias type {other}"))),
    };
    Ok(Self { path, alias_type })
  }
}

/// Decode the value of a field holding alias records.
pub fn decode_aliases(field: &str, raw: Option<&Value>) -> Result<Vec<RawAlias>> {
  match raw {
    None | Some(Value::Null) => Ok(Vec::new()),
    Some(Value::Array(records)) => records
      .iter()
      .map(|r| RawAlias::from_record(field, r))
      .collect(),
    Some(other) => Err(Error::UnsupportedValue {
      field:   field.to_owned(),
      message: format!("expected alias records, got {other}"),
    }),
  }
}

/// `None` when there are no aliases.
pub fn encode_aliases(aliases: Vec<RawAlias>) -> Option<Value> {
  (!aliases.is_empty())
    .then(|| Value::Array(aliases.into_iter().map(RawAlias::into_record).collect()))
}

pub fn encode_attribute(value: &Value) -> Result<String> { Ok(serde_json::to_string(value)?) }

pub fn decode_attribute(text: &str) -> Result<Value> { Ok(serde_json::from_str(text)?) }
