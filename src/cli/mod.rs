// src/cli/mod.rs
// Command line front end over a SQLite-backed router

pub mod index;
pub mod init;
pub mod tables;

use crate::settings::Settings;
use crate::sheets::{BackingStore, DistributionRouter, SheetError, SheetResult, SqliteStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "sheetshard")]
#[command(about = "SheetShard - key-addressed tables sharded across size-limited documents", long_about = None)]
pub struct Cli {
    /// Directory holding the document files (overrides settings and SHEETSHARD_ROOT)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Index document id (overrides settings and SHEETSHARD_INDEX)
    #[arg(long, global = true)]
    pub index: Option<String>,

    /// Data tables per shard before a new shard is started
    #[arg(long, global = true)]
    pub sheet_limit: Option<usize>,

    /// Open tables with a full in-memory snapshot
    #[arg(long, global = true)]
    pub cache: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new index document and remember it in the settings file
    Init {
        /// Header of the template every new table starts from
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,
    },

    /// Provision the table for a key (no-op if it already exists)
    CreateTable { key: String },

    /// Print every record of a key's table
    Show { key: String },

    /// Append one record, given as column=value pairs
    Append {
        key: String,
        #[arg(value_parser = parse_assignment, required = true)]
        values: Vec<(String, String)>,
    },

    /// Print the first record whose column equals value
    Find {
        key: String,
        column: String,
        value: String,
    },

    /// Delete every record whose column equals value
    Delete {
        key: String,
        column: String,
        value: String,
    },

    /// List known shard documents, oldest first
    Documents,

    /// List every registered key and where it lives
    Keys,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((column, value)) if !column.trim().is_empty() => {
            Ok((column.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected column=value, got '{}'", raw)),
    }
}

impl Cli {
    /// Fold command line flags over already loaded settings.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(root) = &self.root {
            settings.store_root = root.clone();
        }
        if let Some(index) = &self.index {
            settings.index_document = Some(index.clone());
        }
        if let Some(limit) = self.sheet_limit {
            settings.sheet_limit = limit;
        }
        if self.cache {
            settings.cache = true;
        }
    }
}

/// Store plus settings shared by every command.
pub struct CliContext {
    pub settings: Settings,
    pub store: Arc<dyn BackingStore>,
}

impl CliContext {
    pub fn new(settings: Settings) -> SheetResult<Self> {
        let store = SqliteStore::open(&settings.store_root)?;
        Ok(Self {
            settings,
            store: Arc::new(store),
        })
    }

    pub fn with_store(settings: Settings, store: Arc<dyn BackingStore>) -> Self {
        Self { settings, store }
    }

    pub fn router(&self) -> SheetResult<DistributionRouter> {
        DistributionRouter::open(Arc::clone(&self.store), self.settings.router_config()?)
    }
}

/// Run one command and return what it prints. `Init` also records the new
/// index document in `ctx.settings`; persisting it is up to the caller.
pub fn execute(ctx: &mut CliContext, command: &Commands) -> SheetResult<serde_json::Value> {
    match command {
        Commands::Init { columns } => init::run(ctx, columns),
        Commands::CreateTable { key } => tables::create_table(ctx, key),
        Commands::Show { key } => tables::show(ctx, key),
        Commands::Append { key, values } => tables::append(ctx, key, values),
        Commands::Find { key, column, value } => tables::find(ctx, key, column, value),
        Commands::Delete { key, column, value } => tables::delete(ctx, key, column, value),
        Commands::Documents => index::documents(ctx),
        Commands::Keys => index::keys(ctx),
    }
}

pub(crate) fn unknown_key(key: &str) -> SheetError {
    SheetError::UnknownKey(key.to_string())
}
