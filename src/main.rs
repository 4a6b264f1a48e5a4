//! Syncstore CLI - inspect and maintain a sync client's metadata database

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use syncstore::config::{self, SyncstoreConfig};
use syncstore::ui::{self, Icons};
use syncstore::{FileStore, QueryRequest, Selection};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "syncstore")]
#[command(version = "0.0.1")]
#[command(about = "Local metadata store of a file-sync client")]
#[command(long_about = r#"
Syncstore keeps the files, shares, capabilities, uploads and quotas a sync
client knows about, addressed by content addresses such as:
  content://org.syncstore/file/12
  content://org.syncstore/dir/3
  content://org.syncstore/uploads

Example usage:
  syncstore init
  syncstore migrate
  syncstore query content://org.syncstore/dir/1 --columns filename,path
  syncstore delete content://org.syncstore/file/12
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Open the database, upgrading its schema to the current version
    Migrate,

    /// Show row counts per table
    Stats,

    /// Query rows at an address
    Query {
        /// Address to query
        address: String,

        /// Comma-separated columns to return
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Selection clause with `?` placeholders
        #[arg(short = 'w', long = "where")]
        selection: Option<String>,

        /// Value bound to the next placeholder
        #[arg(short, long = "arg")]
        args: Vec<String>,

        /// Sort order, e.g. "filename DESC"
        #[arg(short, long)]
        sort: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Delete rows at an address
    Delete {
        /// Address to delete
        address: String,

        /// Selection clause with `?` placeholders
        #[arg(short = 'w', long = "where")]
        selection: Option<String>,

        /// Value bound to the next placeholder
        #[arg(short, long = "arg")]
        args: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let settings = config::load_config(Some(&config_path))
        .with_context(|| format!("failed to read {}", config_path.display()))?
        .unwrap_or_default();
    let database = cli
        .database
        .clone()
        .unwrap_or_else(|| settings.database_path());

    if let Err(e) = run(cli.command, &config_path, &database, &settings) {
        ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

fn run(
    command: Commands,
    config_path: &Path,
    database: &Path,
    settings: &SyncstoreConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::Init { force } => {
            let config = SyncstoreConfig {
                database: Some(database.display().to_string()),
                ..settings.clone()
            };
            config::write_config(config_path, &config, force)?;
            ui::success(&format!("Wrote {}", config_path.display()));
            ui::info("Database", &database.display().to_string());
        }

        Commands::Migrate => {
            let store = open_store(database, settings)?;
            ui::header(Icons::DATABASE, "Schema");
            ui::info("Database", &database.display().to_string());
            ui::info("Version", &store.schema_version()?.to_string());
            ui::success("Schema is current");
        }

        Commands::Stats => {
            let store = open_store(database, settings)?;
            let stats = store.stats()?;
            ui::header(Icons::STATS, "Store Statistics");
            ui::info("Schema version", &stats.schema_version.to_string());
            println!(
                "{}",
                ui::stats_table(&[
                    ("Files", stats.files.to_string()),
                    ("Folders", stats.folders.to_string()),
                    ("Shares", stats.shares.to_string()),
                    ("Capabilities", stats.capabilities.to_string()),
                    ("Uploads", stats.uploads.to_string()),
                    ("Succeeded uploads", stats.succeeded_uploads.to_string()),
                    ("Camera upload cursors", stats.camera_uploads_sync.to_string()),
                    ("Quotas", stats.quotas.to_string()),
                    ("Avatars", stats.avatars.to_string()),
                ])
            );
        }

        Commands::Query {
            address,
            columns,
            selection,
            args,
            sort,
            format,
        } => {
            let store = open_store(database, settings)?;
            let mut request = QueryRequest::new();
            if !columns.is_empty() {
                request = request.columns(columns);
            }
            if let Some(selection) = build_selection(selection, args) {
                request = request.selection(selection);
            }
            if let Some(sort) = sort {
                request = request.sort_order(sort);
            }

            let rows = store.query(&address, &request)?;
            match format {
                Format::Json => {
                    let json: Vec<_> = rows.iter().map(|row| row.to_json()).collect();
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
                Format::Text => {
                    ui::header(Icons::MAG, &format!("{} rows", rows.len()));
                    println!("  {}", ui::address(&rows.address().to_address_string()));
                    if rows.is_empty() {
                        println!("{}", ui::dim("  (no rows)"));
                    } else {
                        println!("{}", ui::rows_table(&rows));
                    }
                }
            }
        }

        Commands::Delete {
            address,
            selection,
            args,
        } => {
            let store = open_store(database, settings)?;
            let selection = build_selection(selection, args);
            let removed = store.delete(&address, selection.as_ref())?;
            if removed == 0 {
                ui::warn("Nothing matched");
            } else {
                println!("{} Deleted {} rows", Icons::DEL, removed);
            }
        }
    }

    Ok(())
}

fn open_store(database: &Path, settings: &SyncstoreConfig) -> anyhow::Result<FileStore> {
    config::ensure_db_dir(database)?;
    tracing::debug!("Opening {}", database.display());
    let store = FileStore::open(database, settings.store_options())
        .with_context(|| format!("failed to open {}", database.display()))?;
    Ok(store)
}

fn build_selection(clause: Option<String>, args: Vec<String>) -> Option<Selection> {
    let clause = clause?;
    let selection = args
        .into_iter()
        .fold(Selection::new(clause).no_args(), |selection, arg| {
            selection.arg(arg)
        });
    Some(selection)
}
