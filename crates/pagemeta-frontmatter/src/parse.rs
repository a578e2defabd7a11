//! Splitting a page source into its frontmatter block and body.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub(crate) const OPEN: &str = "---json";
pub(crate) const CLOSE: &str = "---";

/// The line starting at `at`, without its line ending, and the offset just
/// past that ending.
fn line_at(source: &str, at: usize) -> (&str, usize) {
  let rest = &source[at..];
  match rest.find('\n') {
    Some(end) => (rest[..end].strip_suffix('\r').unwrap_or(&rest[..end]), at + end + 1),
    None => (rest, source.len()),
  }
}

/// Split `source` into the text between the delimiters (if the source opens
/// with a block) and the body that follows it.
pub fn split(source: &str) -> Result<(Option<&str>, &str)> {
  let (first, mut next) = line_at(source, 0);
  if first.trim_end() != OPEN {
    return Ok((None, source));
  }

  let interior_start = next;
  while next < source.len() {
    let line_start = next;
    let (line, after) = line_at(source, line_start);
    if line.trim_end() == CLOSE {
      return Ok((Some(&source[interior_start..line_start]), &source[after..]));
    }
    next = after;
  }
  Err(Error::Unterminated)
}

/// Decode the text between the delimiters. An empty interior is an empty
/// object.
pub fn decode_block(interior: &str) -> Result<Map<String, Value>> {
  if interior.trim().is_empty() {
    return Ok(Map::new());
  }
  match serde_json::from_str(interior)? {
    Value::Object(map) => Ok(map),
    _ => Err(Error::NotAnObject),
  }
}

/// The decoded block (empty when there is none) and the body.
pub fn parse(source: &str) -> Result<(Map<String, Value>, &str)> {
  let (interior, body) = split(source)?;
  let block = match interior {
    Some(interior) => decode_block(interior)?,
    None => Map::new(),
  };
  Ok((block, body))
}
