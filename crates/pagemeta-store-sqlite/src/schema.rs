//! SQL schema for the page metadata side store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per alias of a page, keyed by its natural key.
CREATE TABLE IF NOT EXISTS page_aliases (
    page_id    TEXT NOT NULL,
    path       TEXT NOT NULL,
    alias_type TEXT,             -- NULL means the column default
    PRIMARY KEY (page_id, path)
);

-- Every other field, as its JSON-encoded relational value.
CREATE TABLE IF NOT EXISTS page_attributes (
    page_id    TEXT NOT NULL,
    name       TEXT NOT NULL,
    value_json TEXT NOT NULL,
    PRIMARY KEY (page_id, name)
);

-- Aliases from before page ids existed. Drained into the native store on
-- first read, never written otherwise.
CREATE TABLE IF NOT EXISTS deprecated_page_aliases (
    canonical  TEXT NOT NULL,
    path       TEXT NOT NULL,
    alias_type TEXT
);

CREATE INDEX IF NOT EXISTS page_aliases_path_idx       ON page_aliases(path);
CREATE INDEX IF NOT EXISTS deprecated_aliases_canon_idx ON deprecated_page_aliases(canonical);

PRAGMA user_version = 1;
";
