//! Conversion between typed values and the raw JSON each store persists.
//!
//! Encoding is a pure function of `(value, StoreKind)`: native documents,
//! frontmatter and the relational store keep JSON-native scalars, while a
//! form submission carries everything as strings. Decoding is lenient about
//! representation (a boolean may arrive as `"on"`, a list as a
//! comma-separated string) but strict about meaning.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::{
  Error, Result,
  descriptor::{DataType, MetadataDescriptor, NativeShape},
  store::StoreKind,
  tabular,
  value::{Origin, TypedValue},
};

// ─── Decoding ────────────────────────────────────────────────────────────────

/// Decode a raw store value; empty values decode to `None`.
pub fn decode(
  descriptor: &MetadataDescriptor,
  raw: &Value,
  kind: StoreKind,
) -> Result<Option<TypedValue>> {
  if raw.is_null() {
    return Ok(None);
  }
  let value = match descriptor.data_type {
    DataType::Tabular => {
      Some(TypedValue::Table(tabular::decode(descriptor, raw, kind)?))
    }
    DataType::Text | DataType::Paragraph => decode_text(descriptor, raw)?,
    DataType::Boolean => decode_bool(descriptor, raw)?,
    DataType::Integer => decode_integer(descriptor, raw)?,
    DataType::Date => decode_date(descriptor, raw)?,
    DataType::List => decode_list(descriptor, raw)?,
  };
  Ok(value.filter(|v| !v.is_empty()))
}

fn decode_text(
  descriptor: &MetadataDescriptor,
  raw: &Value,
) -> Result<Option<TypedValue>> {
  match raw {
    Value::String(s) => Ok(Some(TypedValue::Text(s.clone()))),
    Value::Number(n) => Ok(Some(TypedValue::Text(n.to_string()))),
    Value::Bool(b) => Ok(Some(TypedValue::Text(b.to_string()))),
    other => Err(Error::bad_syntax(
      descriptor.name,
      format!("expected text, got {other}"),
    )),
  }
}

fn decode_bool(
  descriptor: &MetadataDescriptor,
  raw: &Value,
) -> Result<Option<TypedValue>> {
  let value = match raw {
    Value::Bool(b) => Some(*b),
    Value::Number(n) => match n.as_i64() {
      Some(0) => Some(false),
      Some(1) => Some(true),
      _ => None,
    },
    Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
      "" => return Ok(None),
      "true" | "1" | "on" | "yes" => Some(true),
      "false" | "0" | "off" | "no" => Some(false),
      _ => None,
    },
    _ => None,
  };
  value.map(|b| Some(TypedValue::Boolean(b))).ok_or_else(|| {
    Error::bad_syntax(descriptor.name, format!("not a boolean: {raw}"))
  })
}

fn decode_integer(
  descriptor: &MetadataDescriptor,
  raw: &Value,
) -> Result<Option<TypedValue>> {
  let value = match raw {
    Value::Number(n) => n.as_i64(),
    Value::String(s) if s.trim().is_empty() => return Ok(None),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  };
  value.map(|i| Some(TypedValue::Integer(i))).ok_or_else(|| {
    Error::bad_syntax(descriptor.name, format!("not an integer: {raw}"))
  })
}

fn decode_date(
  descriptor: &MetadataDescriptor,
  raw: &Value,
) -> Result<Option<TypedValue>> {
  let Value::String(s) = raw else {
    return Err(Error::bad_syntax(
      descriptor.name,
      format!("expected a date string, got {raw}"),
    ));
  };
  if s.trim().is_empty() {
    return Ok(None);
  }
  parse_date(s.trim())
    .map(|d| Some(TypedValue::Date(d)))
    .ok_or_else(|| {
      Error::bad_syntax(descriptor.name, format!("not a date: {s:?}"))
    })
}

/// RFC 3339, or a naive date/date-time read as UTC.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
      return Some(naive.and_utc());
    }
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|naive| naive.and_utc())
}

pub fn format_date(date: &DateTime<Utc>) -> String {
  date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn decode_list(
  descriptor: &MetadataDescriptor,
  raw: &Value,
) -> Result<Option<TypedValue>> {
  let items: Vec<String> = match raw {
    Value::Array(items) => items
      .iter()
      .map(|item| match item {
        Value::String(s) => Ok(s.trim().to_owned()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(Error::bad_syntax(
          descriptor.name,
          format!("list items must be strings, got {other}"),
        )),
      })
      .collect::<Result<_>>()?,
    Value::String(s) => s.split(',').map(|item| item.trim().to_owned()).collect(),
    other => {
      return Err(Error::bad_syntax(
        descriptor.name,
        format!("expected a list, got {other}"),
      ));
    }
  };

  let mut unique: Vec<String> = Vec::with_capacity(items.len());
  for item in items {
    if !item.is_empty() && !unique.contains(&item) {
      unique.push(item);
    }
  }
  Ok(Some(TypedValue::List(unique)))
}

// ─── Encoding ────────────────────────────────────────────────────────────────

/// Encode a typed value for a store of the given kind; empty values encode
/// to `None`.
pub fn encode(
  descriptor: &MetadataDescriptor,
  value: &TypedValue,
  kind: StoreKind,
) -> Result<Option<Value>> {
  if value.is_empty() {
    return Ok(None);
  }
  if !value.fits(descriptor.data_type) {
    return Err(Error::Internal(format!(
      "{} holds a {value:?}, expected {:?}",
      descriptor.name, descriptor.data_type
    )));
  }
  match value {
    TypedValue::Table(table) => tabular::encode(descriptor, table, kind),
    scalar => Ok(Some(encode_scalar(scalar, kind))),
  }
}

pub(crate) fn encode_scalar(value: &TypedValue, kind: StoreKind) -> Value {
  let as_form = kind == StoreKind::FormSubmission;
  match value {
    TypedValue::Text(s) => Value::String(s.clone()),
    TypedValue::Boolean(b) if as_form => Value::String(b.to_string()),
    TypedValue::Boolean(b) => Value::Bool(*b),
    TypedValue::Integer(i) if as_form => Value::String(i.to_string()),
    TypedValue::Integer(i) => Value::from(*i),
    TypedValue::Date(d) => Value::String(format_date(d)),
    TypedValue::List(items) => {
      Value::Array(items.iter().cloned().map(Value::String).collect())
    }
    TypedValue::Table(_) => Value::Null,
  }
}

// ─── Provenance ──────────────────────────────────────────────────────────────

/// Split a native `{<primary_key>: value, origin}` object into its value and
/// origin. Other stores and bare-shaped fields pass through untouched.
pub fn split_provenance<'a>(
  descriptor: &MetadataDescriptor,
  raw: &'a Value,
  kind: StoreKind,
) -> (Option<&'a Value>, Option<Origin>) {
  let NativeShape::Provenance { primary_key } = descriptor.native_shape else {
    return (Some(raw), None);
  };
  if kind != StoreKind::NativeDocument {
    return (Some(raw), None);
  }
  match raw {
    Value::Object(map) => {
      let origin = Origin::from_tag(map.get("origin").and_then(Value::as_str));
      (map.get(primary_key), Some(origin))
    }
    // A bare value predates the provenance tag and was written by this
    // plugin.
    other => (Some(other), Some(Origin::User)),
  }
}

/// Wrap an encoded native value with its origin tag.
pub fn join_provenance(
  descriptor: &MetadataDescriptor,
  value: Value,
  origin: Origin,
) -> Value {
  match descriptor.native_shape {
    NativeShape::Provenance { primary_key } => {
      let mut map = serde_json::Map::new();
      map.insert(primary_key.to_owned(), value);
      map.insert("origin".to_owned(), Value::String(origin.as_tag().to_owned()));
      Value::Object(map)
    }
    NativeShape::Bare => value,
  }
}
