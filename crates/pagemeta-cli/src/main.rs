//! `pagemeta`: inspect and move page metadata between its stores.
//!
//! # Usage
//!
//! ```text
//! pagemeta show ns:page
//! pagemeta set ns:page title="Hello" keywords='["wiki","rust"]'
//! pagemeta sync-frontmatter ns:page
//! pagemeta replicate ns:page
//! pagemeta migrate ns:page
//! ```
//!
//! Configuration is read from `pagemeta.toml` (or `--config`) and from
//! `PAGEMETA_*` environment variables.

mod commands;
mod workspace;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use pagemeta_core::MetadataConfig;
use serde_json::Value;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use workspace::Workspace;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(author, version, about = "Page metadata across the wiki's stores")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "pagemeta.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print every field of a page, defaults applied.
  Show { page: String },
  /// Set fields of a page as an edit form would.
  Set {
    page:        String,
    /// `<field>=<value>`; values are read as JSON when they parse.
    #[arg(required = true, value_parser = commands::parse_assignment)]
    assignments: Vec<(String, Value)>,
  },
  /// Import a page's frontmatter and rewrite it in canonical form.
  SyncFrontmatter { page: String },
  /// Copy a page's metadata to the SQLite side store.
  Replicate { page: String },
  /// Move a page's deprecated aliases into its native metadata.
  Migrate { page: String },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("PAGEMETA")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("alias_types")
        .with_list_parse_key("image_usages"),
    )
    .build()
    .context("failed to read config file")?;

  let config: MetadataConfig = settings
    .try_deserialize()
    .context("failed to deserialise MetadataConfig")?;
  let ws = Workspace::open(workspace::expand_paths(config))?;

  let mut out = std::io::stdout().lock();
  let (page, errors) = match cli.command {
    Command::Show { page } => {
      let errors = commands::show(&ws, &page, &mut out)?;
      (page, errors)
    }
    Command::Set { page, assignments } => {
      let errors = commands::set(&ws, &page, assignments, &mut out)?;
      (page, errors)
    }
    Command::SyncFrontmatter { page } => {
      let errors = commands::sync_frontmatter(&ws, &page, &mut out)?;
      (page, errors)
    }
    Command::Replicate { page } => {
      let errors = commands::replicate(&ws, &page, &mut out)?;
      (page, errors)
    }
    Command::Migrate { page } => {
      let errors = commands::migrate(&ws, &page, &mut out)?;
      (page, errors)
    }
  };

  if errors > 0 {
    anyhow::bail!("{errors} field(s) of {page} were rejected");
  }
  tracing::info!(%page, "done");
  Ok(())
}
