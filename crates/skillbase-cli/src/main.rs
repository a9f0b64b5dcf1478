//! CLI entry point for skillbase.
//!
//! The `skillbase` binary opens the configured database and runs one
//! store operation per invocation, printing results as JSON.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use skillbase_store::{
    Database, DatabaseOptions, IdGenerator, Listing, Retrieval, Skill, SkillStore, WriteOutcome,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, DEFAULT_CONFIG_PATH};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// skillbase — manage the skill catalogue.
#[derive(Parser)]
#[command(name = "skillbase", version, about = "Manage the skill catalogue")]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations and exit.
    Migrate,

    /// Create a skill and print it with its new id.
    Add {
        name: String,
        #[arg(long)]
        authorized: bool,
    },

    /// Show one skill.
    Get { id: String },

    /// List skills ordered by id.
    List {
        #[arg(long, default_value_t = 1)]
        page: i64,
        /// Defaults to `store.page_size` from the config file.
        #[arg(long)]
        per_page: Option<i64>,
    },

    /// Show every skill among the given ids.
    Fetch {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Find skills whose name contains a term.
    Search { term: String },

    /// Grant (or with --revoke, withdraw) authorization.
    Authorize {
        id: String,
        #[arg(long)]
        revoke: bool,
    },

    /// Delete a skill.
    Delete { id: String },

    /// Print whether a skill exists.
    Exists { id: String },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    init_tracing(&config.log.level);

    let db = open_database(&config).await?;
    let store = SkillStore::with_generator(
        db,
        IdGenerator::new().max_attempts(config.store.max_id_attempts),
    );

    match cli.command {
        Commands::Migrate => {
            info!("schema is up to date");
            Ok(())
        }
        Commands::Add { name, authorized } => cmd_add(&store, name, authorized).await,
        Commands::Get { id } => cmd_get(&store, &id).await,
        Commands::List { page, per_page } => {
            let per_page = per_page.unwrap_or(config.store.page_size);
            let listing = store.retrieve_all(page, per_page).await?;
            print_listing("list", listing)
        }
        Commands::Fetch { ids } => print_listing("fetch", store.retrieve_by_ids(&ids).await),
        Commands::Search { term } => {
            let listing = store.search_by_term(&term).await?;
            print_listing("search", listing)
        }
        Commands::Authorize { id, revoke } => cmd_authorize(&store, &id, !revoke).await,
        Commands::Delete { id } => cmd_delete(&store, &id).await,
        Commands::Exists { id } => {
            println!("{}", store.exists(&id).await?);
            Ok(())
        }
    }
}

async fn open_database(config: &Config) -> Result<Database> {
    let path = config.store.path.clone();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let options = DatabaseOptions {
        busy_timeout_ms: config.store.busy_timeout_ms,
    };
    let db = Database::open_and_migrate_with(path.clone(), options)
        .await
        .context("failed to open database")?;
    info!(path = %path.display(), "store initialized");
    Ok(db)
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn cmd_add(store: &SkillStore, name: String, authorized: bool) -> Result<()> {
    let mut skill = Skill::new(name, authorized);
    expect_applied("add", store.save(&mut skill).await?)?;
    print_json(&skill)
}

async fn cmd_get(store: &SkillStore, id: &str) -> Result<()> {
    match store.retrieve(id).await? {
        Retrieval::Found(skill) => print_json(&skill),
        Retrieval::NotFound => bail!("skill not found: {id}"),
        Retrieval::Degraded(err) => {
            warn!(%err, "lookup degraded");
            bail!("skill not found: {id} (store unavailable)")
        }
    }
}

async fn cmd_authorize(store: &SkillStore, id: &str, authorized: bool) -> Result<()> {
    let mut skill = store.retrieve(id).await?.require(id)?;
    skill.authorized = authorized;
    expect_applied("authorize", store.save(&mut skill).await?)?;
    print_json(&skill)
}

async fn cmd_delete(store: &SkillStore, id: &str) -> Result<()> {
    let outcome = store.delete(id).await;
    let deleted = outcome.succeeded();
    if let WriteOutcome::Failed(err) = &outcome {
        warn!(%err, "delete failed");
    }
    println!("{deleted}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn expect_applied(op: &str, outcome: WriteOutcome) -> Result<()> {
    match outcome {
        WriteOutcome::Applied => Ok(()),
        WriteOutcome::NoMatch => bail!("{op}: no matching skill"),
        WriteOutcome::Rejected(reason) => bail!("{op}: {reason}"),
        WriteOutcome::Failed(err) => Err(err).context(format!("{op} failed")),
    }
}

fn print_listing(op: &str, listing: Listing) -> Result<()> {
    if let Some(err) = listing.error() {
        eprintln!("warning: {op} returned no results because the store failed: {err}");
    }
    print_json(&listing.into_vec())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
