//! [`SqliteDatabase`] and its per-page [`SqliteSideStore`].

use std::{
  collections::{BTreeMap, BTreeSet},
  path::Path,
  rc::Rc,
};

use pagemeta_core::{LegacyStore, MetadataDescriptor, MetadataStore, StoreKind, fields};
use rusqlite::{Connection, OptionalExtension as _};
use serde_json::Value;

use crate::{
  Result,
  encode::{
    RawAlias, decode_aliases, decode_attribute, encode_aliases, encode_attribute,
  },
  schema::SCHEMA,
};

// ─── Database ────────────────────────────────────────────────────────────────

/// The SQLite side store of every page.
///
/// Clones share one connection.
#[derive(Clone)]
pub struct SqliteDatabase {
  conn: Rc<Connection>,
}

impl SqliteDatabase {
  /// Open (or create) the database at `path` and run schema initialisation.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let db = Self { conn: Rc::new(Connection::open(path)?) };
    db.init_schema()?;
    Ok(db)
  }

  /// Open an in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    let db = Self { conn: Rc::new(Connection::open_in_memory()?) };
    db.init_schema()?;
    Ok(db)
  }

  fn init_schema(&self) -> Result<()> {
    self.conn.execute_batch(SCHEMA)?;
    Ok(())
  }

  /// The metadata store of one page.
  pub fn side_store(&self, page_id: impl Into<String>) -> SqliteSideStore {
    SqliteSideStore {
      db:      self.clone(),
      page_id: page_id.into(),
      pending: BTreeMap::new(),
    }
  }

  // ── Aliases ───────────────────────────────────────────────────────────────

  /// Insert or replace the alias keyed by `(page_id, alias.path)`.
  pub fn upsert_alias(&self, page_id: &str, alias: &RawAlias) -> Result<()> {
    upsert_alias(&self.conn, page_id, alias)
  }

  /// Returns whether a row was deleted.
  pub fn delete_alias(&self, page_id: &str, path: &str) -> Result<bool> {
    delete_alias(&self.conn, page_id, path)
  }

  /// Every alias of `page_id`, ordered by path.
  pub fn select_aliases(&self, page_id: &str) -> Result<Vec<RawAlias>> {
    select_aliases(&self.conn, page_id)
  }

  /// Record an alias in the deprecated, canonical-keyed table.
  pub fn insert_legacy_alias(&self, canonical: &str, alias: &RawAlias) -> Result<()> {
    self.conn.execute(
      "INSERT INTO deprecated_page_aliases (canonical, path, alias_type)
       VALUES (?1, ?2, ?3)",
      rusqlite::params![canonical, alias.path, alias.alias_type],
    )?;
    Ok(())
  }

  fn select_legacy_aliases(&self, canonical: &str) -> Result<Vec<RawAlias>> {
    let mut stmt = self.conn.prepare(
      "SELECT path, alias_type FROM deprecated_page_aliases
       WHERE canonical = ?1 ORDER BY rowid",
    )?;
    let rows = stmt
      .query_map(rusqlite::params![canonical], |r| {
        Ok(RawAlias { path: r.get(0)?, alias_type: r.get(1)? })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }

  fn delete_legacy_aliases(&self, canonical: &str) -> Result<usize> {
    Ok(self.conn.execute(
      "DELETE FROM deprecated_page_aliases WHERE canonical = ?1",
      rusqlite::params![canonical],
    )?)
  }

  // ── Attributes ────────────────────────────────────────────────────────────

  pub fn select_attribute(&self, page_id: &str, name: &str) -> Result<Option<Value>> {
    let text: Option<String> = self
      .conn
      .query_row(
        "SELECT value_json FROM page_attributes WHERE page_id = ?1 AND name = ?2",
        rusqlite::params![page_id, name],
        |r| r.get(0),
      )
      .optional()?;
    text.as_deref().map(decode_attribute).transpose()
  }
}

impl std::fmt::Debug for SqliteDatabase {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SqliteDatabase").finish_non_exhaustive()
  }
}

// ─── Statements ──────────────────────────────────────────────────────────────

fn upsert_alias(conn: &Connection, page_id: &str, alias: &RawAlias) -> Result<()> {
  conn.execute(
    "INSERT INTO page_aliases (page_id, path, alias_type) VALUES (?1, ?2, ?3)
     ON CONFLICT (page_id, path) DO UPDATE SET alias_type = excluded.alias_type",
    rusqlite::params![page_id, alias.path, alias.alias_type],
  )?;
  Ok(())
}

fn delete_alias(conn: &Connection, page_id: &str, path: &str) -> Result<bool> {
  let deleted = conn.execute(
    "DELETE FROM page_aliases WHERE page_id = ?1 AND path = ?2",
    rusqlite::params![page_id, path],
  )?;
  Ok(deleted > 0)
}

fn select_aliases(conn: &Connection, page_id: &str) -> Result<Vec<RawAlias>> {
  let mut stmt = conn.prepare(
    "SELECT path, alias_type FROM page_aliases WHERE page_id = ?1 ORDER BY path",
  )?;
  let rows = stmt
    .query_map(rusqlite::params![page_id], |r| {
      Ok(RawAlias { path: r.get(0)?, alias_type: r.get(1)? })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// Make the aliases of `page_id` exactly `aliases`, row by row.
fn replace_aliases(conn: &Connection, page_id: &str, aliases: &[RawAlias]) -> Result<()> {
  let keep: BTreeSet<&str> = aliases.iter().map(|a| a.path.as_str()).collect();
  for existing in select_aliases(conn, page_id)? {
    if !keep.contains(existing.path.as_str()) {
      delete_alias(conn, page_id, &existing.path)?;
    }
  }
  for alias in aliases {
    upsert_alias(conn, page_id, alias)?;
  }
  Ok(())
}

fn write_attribute(
  conn: &Connection,
  page_id: &str,
  name: &str,
  value: Option<&Value>,
) -> Result<()> {
  match value {
    Some(value) => {
      conn.execute(
        "INSERT INTO page_attributes (page_id, name, value_json) VALUES (?1, ?2, ?3)
         ON CONFLICT (page_id, name) DO UPDATE SET value_json = excluded.value_json",
        rusqlite::params![page_id, name, encode_attribute(value)?],
      )?;
    }
    None => {
      conn.execute(
        "DELETE FROM page_attributes WHERE page_id = ?1 AND name = ?2",
        rusqlite::params![page_id, name],
      )?;
    }
  }
  Ok(())
}

// ─── LegacyStore impl ────────────────────────────────────────────────────────

impl LegacyStore for SqliteDatabase {
  fn select_legacy(&self, field: &str, canonical: &str) -> pagemeta_core::Result<Vec<Value>> {
    if field != fields::ALIASES.name {
      return Ok(Vec::new());
    }
    let rows = self.select_legacy_aliases(canonical)?;
    Ok(rows.into_iter().map(RawAlias::into_record).collect())
  }

  fn delete_legacy(&self, field: &str, canonical: &str) -> pagemeta_core::Result<()> {
    if field == fields::ALIASES.name {
      let deleted = self.delete_legacy_aliases(canonical)?;
      tracing::debug!(%canonical, rows = deleted, "deleted deprecated aliases");
    }
    Ok(())
  }
}

// ─── Side store ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum PendingWrite {
  Aliases(Vec<RawAlias>),
  Attribute(Option<Value>),
}

/// The relational metadata of one page.
///
/// `set` only stages a write; [`MetadataStore::persist`] applies every staged
/// write in one transaction. Reads see staged writes.
#[derive(Debug)]
pub struct SqliteSideStore {
  db:      SqliteDatabase,
  page_id: String,
  pending: BTreeMap<String, PendingWrite>,
}

impl SqliteSideStore {
  pub fn page_id(&self) -> &str { &self.page_id }

  /// Whether writes are staged.
  pub fn has_pending(&self) -> bool { !self.pending.is_empty() }

  fn is_alias_field(descriptor: &MetadataDescriptor) -> bool {
    descriptor.name == fields::ALIASES.name
  }
}

impl MetadataStore for SqliteSideStore {
  fn kind(&self) -> StoreKind { StoreKind::Relational }

  fn get(&self, descriptor: &MetadataDescriptor) -> pagemeta_core::Result<Option<Value>> {
    match self.pending.get(descriptor.name) {
      Some(PendingWrite::Aliases(aliases)) => return Ok(encode_aliases(aliases.clone())),
      Some(PendingWrite::Attribute(value)) => return Ok(value.clone()),
      None => {}
    }
    if Self::is_alias_field(descriptor) {
      return Ok(encode_aliases(self.db.select_aliases(&self.page_id)?));
    }
    Ok(self.db.select_attribute(&self.page_id, descriptor.name)?)
  }

  fn set(
    &mut self,
    descriptor: &MetadataDescriptor,
    value: Option<Value>,
  ) -> pagemeta_core::Result<()> {
    let write = if Self::is_alias_field(descriptor) {
      PendingWrite::Aliases(decode_aliases(descriptor.name, value.as_ref())?)
    } else {
      PendingWrite::Attribute(value)
    };
    self.pending.insert(descriptor.name.to_owned(), write);
    Ok(())
  }

  fn persist(&mut self) -> pagemeta_core::Result<()> {
    if self.pending.is_empty() {
      return Ok(());
    }
    let conn = &self.db.conn;
    let tx = conn.unchecked_transaction().map_err(crate::Error::from)?;
    for (name, write) in &self.pending {
      let applied = match write {
        PendingWrite::Aliases(aliases) => replace_aliases(&tx, &self.page_id, aliases),
        PendingWrite::Attribute(value) => {
          write_attribute(&tx, &self.page_id, name, value.as_ref())
        }
      };
      if let Err(e) = applied {
        tracing::warn!(page_id = %self.page_id, field = %name, error = %e, "side store write failed");
        return Err(e.into());
      }
    }
    tx.commit().map_err(crate::Error::from)?;
    tracing::debug!(
      page_id = %self.page_id,
      fields = self.pending.len(),
      "persisted side store"
    );
    self.pending.clear();
    Ok(())
  }
}
