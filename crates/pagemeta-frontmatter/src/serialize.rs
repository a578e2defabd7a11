//! Deterministic frontmatter serializer.
//!
//! The top-level object gets one key per line, indented by four spaces, keys
//! sorted. Arrays of objects get one element per line; every other value,
//! including the objects inside those arrays, is written on a single line.
//! Re-serializing an unchanged block therefore reproduces it byte for byte.

use serde_json::{Map, Value};

use crate::parse::{CLOSE, OPEN};

const INDENT: &str = "    ";

fn push_string(out: &mut String, s: &str) {
  // Serializing a `&str` cannot fail.
  out.push_str(&serde_json::to_string(s).unwrap_or_default());
}

fn sorted(map: &Map<String, Value>) -> Vec<(&String, &Value)> {
  let mut entries: Vec<_> = map.iter().collect();
  entries.sort_by(|a, b| a.0.cmp(b.0));
  entries
}

/// `value` on one line, with `", "` and `": "` separators.
fn push_inline(out: &mut String, value: &Value) {
  match value {
    Value::String(s) => push_string(out, s),
    Value::Array(items) => {
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push_str(", ");
        }
        push_inline(out, item);
      }
      out.push(']');
    }
    Value::Object(map) => {
      out.push('{');
      for (i, (key, item)) in sorted(map).into_iter().enumerate() {
        if i > 0 {
          out.push_str(", ");
        }
        push_string(out, key);
        out.push_str(": ");
        push_inline(out, item);
      }
      out.push('}');
    }
    scalar => out.push_str(&scalar.to_string()),
  }
}

fn is_record_list(value: &Value) -> bool {
  matches!(
    value,
    Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object)
  )
}

/// The JSON text between the delimiters.
pub fn encode_block(block: &Map<String, Value>) -> String {
  let mut out = String::from("{\n");
  let entries = sorted(block);
  let last = entries.len().saturating_sub(1);
  for (i, (key, value)) in entries.into_iter().enumerate() {
    out.push_str(INDENT);
    push_string(&mut out, key);
    out.push_str(": ");
    match value {
      Value::Array(items) if is_record_list(value) => {
        out.push_str("[\n");
        let last_item = items.len() - 1;
        for (j, item) in items.iter().enumerate() {
          out.push_str(INDENT);
          out.push_str(INDENT);
          push_inline(&mut out, item);
          if j < last_item {
            out.push(',');
          }
          out.push('\n');
        }
        out.push_str(INDENT);
        out.push(']');
      }
      other => push_inline(&mut out, other),
    }
    if i < last {
      out.push(',');
    }
    out.push('\n');
  }
  out.push('}');
  out
}

/// A page source with `block` at its head. An empty block is left out.
pub fn render(block: &Map<String, Value>, body: &str) -> String {
  if block.is_empty() {
    return body.to_owned();
  }
  format!("{OPEN}\n{}\n{CLOSE}\n{body}", encode_block(block))
}
