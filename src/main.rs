//! Chestvault CLI - operator tooling for the chest persistence engine

use chestvault::cache::ChestStore;
use chestvault::config::{self, ChestvaultConfig};
use chestvault::connector::{Connector, SqliteConnector};
use chestvault::item::JsonItemCodec;
use chestvault::migration::{all_migrations, MigrationRunner};
use chestvault::storage::rows;
use chestvault::tier::{IdentityCatalog, Tier};
use chestvault::Location;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "chestvault")]
#[command(version = "0.1.0")]
#[command(about = "Cache-backed container persistence engine with write-behind storage")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a chestvault.toml with the default settings
    Init {
        /// Config file location
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Bring the backing schema up to the current revision
    Migrate {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Table name prefix
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Show row counts for the backing store
    Stats {
        #[arg(short, long)]
        database: Option<PathBuf>,

        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// List every stored chest
    List {
        #[arg(short, long)]
        database: Option<PathBuf>,

        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Create a chest at a location
    Place {
        #[arg(short, long)]
        database: Option<PathBuf>,

        #[arg(short, long)]
        prefix: Option<String>,

        /// Tier id for the new chest
        #[arg(short, long)]
        tier: i64,

        /// World identifier
        #[arg(short, long)]
        world: String,

        x: f64,
        y: f64,
        z: f64,
    },

    /// Delete a chest by id
    Remove {
        #[arg(short, long)]
        database: Option<PathBuf>,

        #[arg(short, long)]
        prefix: Option<String>,

        /// Id of the chest to delete
        #[arg(short, long)]
        id: i64,
    },
}

#[derive(Tabled)]
struct ChestRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Tier")]
    tier: i64,
    #[tabled(rename = "World")]
    world: String,
    #[tabled(rename = "X")]
    x: f64,
    #[tabled(rename = "Y")]
    y: f64,
    #[tabled(rename = "Z")]
    z: f64,
    #[tabled(rename = "Items")]
    items: usize,
}

/// Resolve database path and prefix from flags, falling back to the config
/// file, then the built-in defaults.
fn settings(
    database: Option<PathBuf>,
    prefix: Option<String>,
) -> anyhow::Result<(PathBuf, String, usize)> {
    let cfg: ChestvaultConfig = config::load_config(None)?.unwrap_or_default();
    let database = database
        .or_else(|| cfg.database.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("chests.db"));
    let prefix = prefix.unwrap_or_else(|| cfg.table_prefix().to_string());
    Ok((database, prefix, cfg.workers()))
}

fn open_store(database: &PathBuf, prefix: &str, workers: usize) -> anyhow::Result<ChestStore> {
    config::ensure_db_dir(database)?;
    let connector = Arc::new(SqliteConnector::open(database)?);
    tracing::info!("using sqlite database at {}", database.display());
    Ok(ChestStore::new(
        connector as Arc<dyn Connector>,
        Arc::new(IdentityCatalog),
        Arc::new(JsonItemCodec),
        prefix,
        workers,
    ))
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
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { path, force } => {
            let path = path.unwrap_or_else(config::default_config_path);
            let cfg = ChestvaultConfig {
                database: Some("chests.db".to_string()),
                table_prefix: Some(config::DEFAULT_TABLE_PREFIX.to_string()),
                workers: Some(config::DEFAULT_WORKERS),
            };
            config::write_config(&path, &cfg, force)?;
            println!("{} wrote {}", "✔".green(), path.display());
        }

        Commands::Migrate { database, prefix } => {
            let (database, prefix, _) = settings(database, prefix)?;
            config::ensure_db_dir(&database)?;
            let connector = SqliteConnector::open(&database)?;
            let migrations = all_migrations(&prefix);
            let runner = MigrationRunner::new(&prefix);
            connector.with_connection(&mut |conn| runner.run(&migrations, conn))?;
            connector.close();
            println!("{} schema is up to date", "✔".green());
        }

        Commands::Stats { database, prefix } => {
            let (database, prefix, _) = settings(database, prefix)?;
            let connector = SqliteConnector::open(&database)?;
            let migrations = all_migrations(&prefix);
            let runner = MigrationRunner::new(&prefix);
            let mut counts = None;
            connector.with_connection(&mut |conn| {
                runner.run(&migrations, conn)?;
                counts = Some(rows::stats(conn, &prefix)?);
                Ok(())
            })?;
            connector.close();
            if let Some(counts) = counts {
                println!("{counts}");
            }
        }

        Commands::List { database, prefix } => {
            let (database, prefix, _) = settings(database, prefix)?;
            let connector = SqliteConnector::open(&database)?;
            let migrations = all_migrations(&prefix);
            let runner = MigrationRunner::new(&prefix);
            let mut chests = Vec::new();
            connector.with_connection(&mut |conn| {
                runner.run(&migrations, conn)?;
                chests = rows::load_all(conn, &prefix, &IdentityCatalog, &JsonItemCodec)?;
                Ok(())
            })?;
            connector.close();

            if chests.is_empty() {
                println!("no chests stored");
            } else {
                chests.sort_by_key(|chest| chest.id);
                let table = Table::new(chests.iter().map(|chest| ChestRow {
                    id: chest.id,
                    tier: chest.tier.id,
                    world: chest.location.world.clone(),
                    x: chest.location.x,
                    y: chest.location.y,
                    z: chest.location.z,
                    items: chest.items.len(),
                }));
                println!("{table}");
            }
        }

        Commands::Place {
            database,
            prefix,
            tier,
            world,
            x,
            y,
            z,
        } => {
            let (database, prefix, workers) = settings(database, prefix)?;
            let store = open_store(&database, &prefix, workers)?;
            store.start()?;
            store.flush();

            let location = Location::new(world, x, y, z);
            if let Some(existing) = store.find_by_location(&location) {
                println!(
                    "{} chest {} already occupies {}",
                    "✘".red(),
                    existing.id,
                    existing.location
                );
            } else {
                let chest = store.create(Tier::new(tier), location);
                println!(
                    "{} placed chest {} (tier {}) at {}",
                    "✔".green(),
                    chest.id,
                    chest.tier.id,
                    chest.location
                );
            }
            store.stop();
        }

        Commands::Remove {
            database,
            prefix,
            id,
        } => {
            let (database, prefix, workers) = settings(database, prefix)?;
            let store = open_store(&database, &prefix, workers)?;
            store.start()?;
            store.flush();

            match store.get(id) {
                Some(chest) => {
                    store.delete(id);
                    println!("{} removed chest {} at {}", "✔".green(), id, chest.location);
                }
                None => println!("{} no chest with id {}", "✘".red(), id),
            }
            store.stop();
        }
    }

    Ok(())
}
