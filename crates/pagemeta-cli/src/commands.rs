//! One function per subcommand. Each writes its report to `out` and returns
//! the number of fields that were rejected.

use std::{cell::RefCell, io::Write, rc::Rc};

use anyhow::Context as _;
use pagemeta_core::{
  FormSubmissionStore, MetadataValue, StoreHandle, StoreKind, Transfer, TransferOutcome,
  TypedValue, codec, fields, store::share,
};
use serde_json::{Map, Value};

use crate::workspace::Workspace;

/// Parse `field=value`. The value is read as JSON when it parses, as text
/// otherwise.
pub fn parse_assignment(s: &str) -> Result<(String, Value), String> {
  let (field, value) = s
    .split_once('=')
    .ok_or_else(|| format!("expected <field>=<value>, got {s:?}"))?;
  let field = field.trim();
  if field.is_empty() {
    return Err(format!("missing field name in {s:?}"));
  }
  let value =
    serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_owned()));
  Ok((field.to_owned(), value))
}

fn report(label: &str, outcome: &TransferOutcome, out: &mut impl Write) -> anyhow::Result<usize> {
  for message in outcome.messages() {
    writeln!(out, "{message}")?;
  }
  writeln!(out, "{label}: {}", outcome.transferred_names().join(", "))?;
  Ok(outcome.errors().count())
}

/// Print every registered field, defaults applied.
pub fn show(ws: &Workspace, path: &str, out: &mut impl Write) -> anyhow::Result<usize> {
  let page = ws.page(path)?;
  let mut fields = Map::new();
  for &descriptor in ws.context().registry().fields() {
    let mut value =
      MetadataValue::new(descriptor, Rc::clone(&page.resource)).with_store(page.native());
    let raw = match value.get().with_context(|| format!("failed to read {}", descriptor.name))? {
      Some(typed) => codec::encode(descriptor, &typed, StoreKind::Frontmatter)?,
      None => None,
    };
    fields.insert(descriptor.name.to_owned(), raw.unwrap_or(Value::Null));
  }
  writeln!(out, "{}", serde_json::to_string_pretty(&Value::Object(fields))?)?;
  Ok(0)
}

/// Submit `assignments` as an edit form and store them in the native
/// document.
pub fn set(
  ws: &Workspace,
  path: &str,
  assignments: Vec<(String, Value)>,
  out: &mut impl Write,
) -> anyhow::Result<usize> {
  let page = ws.page(path)?;
  let form: FormSubmissionStore = assignments.into_iter().collect();
  let names: Vec<String> = form.keys().map(str::to_owned).collect();

  let outcome = Transfer::new(Rc::clone(&page.resource), share(form), page.native())
    .with_names(names)
    .validate()
    .process()?;
  report("stored", &outcome, out)
}

/// Import the frontmatter into the native document, then write the imported
/// fields back in their current form.
pub fn sync_frontmatter(ws: &Workspace, path: &str, out: &mut impl Write) -> anyhow::Result<usize> {
  let page = ws.page(path)?;
  let frontmatter = Rc::new(RefCell::new(page.frontmatter(&ws.config().pages_dir)?));
  let handle: StoreHandle = frontmatter.clone();
  let names: Vec<String> = frontmatter.borrow().keys().map(str::to_owned).collect();

  let imported = Transfer::new(Rc::clone(&page.resource), handle.clone(), page.native())
    .with_names(names)
    .validate()
    .process()?;
  let mut errors = report("imported", &imported, out)?;

  let rewritten = Transfer::new(Rc::clone(&page.resource), page.native(), handle)
    .with_names(imported.transferred_names())
    .validate()
    .process()?;
  errors += report("rewritten", &rewritten, out)?;
  Ok(errors)
}

/// Copy every storable field from the native document to the side store.
pub fn replicate(ws: &Workspace, path: &str, out: &mut impl Write) -> anyhow::Result<usize> {
  let page = ws.page(path)?;
  let side = page.side_store(ws.database())?;
  let names: Vec<&str> = ws
    .context()
    .registry()
    .fields()
    .iter()
    .filter(|d| !d.is_derived() && fields::is_modifiable(d.name))
    .map(|d| d.name)
    .collect();

  let outcome = Transfer::new(Rc::clone(&page.resource), page.native(), share(side))
    .with_names(names)
    .validate()
    .process()?;
  report("replicated", &outcome, out)
}

/// Read the aliases of a page, draining any deprecated rows into the native
/// document.
pub fn migrate(ws: &Workspace, path: &str, out: &mut impl Write) -> anyhow::Result<usize> {
  let page = ws.page(path)?;
  let mut aliases =
    MetadataValue::new(&fields::ALIASES, Rc::clone(&page.resource)).with_store(page.native());
  let rows = aliases.rows().context("failed to read aliases")?;
  for row in &rows {
    let alias_type = row.get("alias_type").and_then(TypedValue::as_text).unwrap_or_default();
    writeln!(out, "{} {alias_type}", row.key)?;
  }
  writeln!(out, "aliases: {}", rows.len())?;
  Ok(0)
}
