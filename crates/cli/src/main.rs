//! Command-line entrypoint for the trade-up backend.
//!
//! Commands:
//! - `catalog` - fetch every catalog document and print the load report
//! - `resolve <file>` - classify raw item records read from a JSON file
//! - `accounts list` / `accounts remove <name>` - inspect the account store

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};
use tradeup_core::{
    catalog::CategoryOutcome,
    config::{self, AppConfig},
    models::{ItemView, RawItemRecord},
    AccountStore, Catalog, HttpCatalogSource,
};

#[derive(Parser)]
#[command(name = "tradeup")]
#[command(about = "Inventory, catalog and trade-up tooling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (-v, -vv for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the catalog and report per-category results
    Catalog,
    /// Resolve raw item records from a JSON file against the catalog
    Resolve {
        /// File holding a JSON array of raw item records
        file: PathBuf,
    },
    /// Manage stored accounts
    Accounts {
        #[command(subcommand)]
        action: AccountsAction,
    },
}

#[derive(Subcommand)]
enum AccountsAction {
    /// List known accounts
    List,
    /// Forget an account and its stored credential
    Remove { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => {
            config::ensure_default_config()?;
            AppConfig::load()?
        }
    };

    match cli.command {
        Commands::Catalog => run_catalog(&config).await,
        Commands::Resolve { file } => run_resolve(&config, &file).await,
        Commands::Accounts { action } => run_accounts(&config, action),
    }
}

async fn load_catalog(config: &AppConfig) -> Result<Catalog> {
    let source = HttpCatalogSource::from_config(config)?;
    let catalog = Catalog::new();
    let report = catalog.reload(&source).await;
    for failed in report.failed() {
        if let CategoryOutcome::Failed { message } = &failed.outcome {
            warn!(category = ?failed.category, "catalog document unavailable: {message}");
        }
    }
    Ok(catalog)
}

async fn run_catalog(config: &AppConfig) -> Result<()> {
    let catalog = load_catalog(config).await?;
    let Some(report) = catalog.last_report() else {
        bail!("catalog produced no report");
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_complete() {
        bail!("{} catalog categories failed to load", report.failed().count());
    }
    Ok(())
}

async fn run_resolve(config: &AppConfig, file: &Path) -> Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let records: Vec<RawItemRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse item records in {}", file.display()))?;

    let catalog = load_catalog(config).await?;
    let views: Vec<ItemView> = records
        .iter()
        .map(|record| ItemView::from_record(record, catalog.resolve(record)))
        .collect();
    let unknown = views.iter().filter(|view| view.name.is_none()).count();
    info!(items = views.len(), unknown, "resolved item records");
    println!("{}", serde_json::to_string_pretty(&views)?);
    Ok(())
}

fn run_accounts(config: &AppConfig, action: AccountsAction) -> Result<()> {
    let store = AccountStore::open(config.accounts_path.clone())?;
    match action {
        AccountsAction::List => {
            for account in store.list() {
                let marker = if account.active { "*" } else { " " };
                let credential = if account.has_credential {
                    "stored credential"
                } else {
                    "no credential"
                };
                println!("{marker} {} ({credential})", account.name);
            }
        }
        AccountsAction::Remove { name } => {
            if !store.remove(&name)? {
                bail!("unknown account {name:?}");
            }
            info!(account = %name, "account removed");
        }
    }
    Ok(())
}

fn init_logging(verbose: u8) -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("tradeup.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
