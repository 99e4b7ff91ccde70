//! Importer CLI - loads project tracking spreadsheets into Postgres
//!
//! Usage:
//!   # Apply the schema:
//!   cargo run --bin importer -- migrate
//!
//!   # Store one import template per project type:
//!   cargo run --bin importer -- seed-templates
//!
//!   # Import a file (add --dry-run to validate without a database):
//!   cargo run --bin importer -- import --file sites.csv --project-type "Free-WIFI for All" --format real
//!
//!   # Export every project as CSV:
//!   cargo run --bin importer -- export --out projects.csv

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use importer::config::ProjectTypeCatalog;
use importer::processor::{import_table, ImportFormat};
use importer::reader::read_upload;
use importer::store::{ImportStore, MemoryStore, PgStore};
use importer::{export, template};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "importer", about = "Imports project tracking spreadsheets")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a CSV or spreadsheet file
    Import {
        /// File to import
        #[arg(long)]
        file: PathBuf,

        /// Project type name as configured in the catalog
        #[arg(long)]
        project_type: String,

        /// Upload layout: template or real
        #[arg(long, default_value = "template")]
        format: ImportFormat,

        /// Validate against an in-memory store; nothing is written
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },
    /// Generate and store import templates for every project type
    SeedTemplates,
    /// Apply database migrations
    Migrate,
    /// Export all projects as CSV
    Export {
        /// Output file
        #[arg(long)]
        out: PathBuf,
    },
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
struct Config {
    db_url: String,
    max_connections: u32,
}

impl Config {
    fn from_env() -> Result<Self> {
        Ok(Self {
            db_url: std::env::var("DB_URL").context("DB_URL env var missing")?,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
        })
    }
}

async fn connect() -> Result<PgPool> {
    let config = Config::from_env()?;
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.db_url)
        .await
        .context("Failed to connect to database")
}

// =============================================================================
// Commands
// =============================================================================

async fn run_import(
    file: PathBuf,
    project_type: String,
    format: ImportFormat,
    dry_run: bool,
) -> Result<()> {
    let catalog = ProjectTypeCatalog::from_env().context("Failed to load project types")?;
    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let settings = catalog.settings();
    let table = read_upload(
        &file_name,
        &bytes,
        settings.max_file_size,
        &settings.allowed_extensions,
    )?;

    tracing::info!(
        file = %file.display(),
        project_type = %project_type,
        format = format.as_str(),
        rows = table.rows.len(),
        dry_run,
        "Importing file"
    );

    let store: Box<dyn ImportStore> = if dry_run {
        Box::new(MemoryStore::new())
    } else {
        Box::new(PgStore::new(connect().await?))
    };

    let result = import_table(store.as_ref(), &catalog, &project_type, format, &table).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        anyhow::bail!(result.error.unwrap_or_else(|| "Import failed".to_string()));
    }
    Ok(())
}

async fn run_seed_templates() -> Result<()> {
    let catalog = ProjectTypeCatalog::from_env().context("Failed to load project types")?;
    let store = PgStore::new(connect().await?);
    let mut rng = StdRng::from_entropy();
    let today = Local::now().date_naive();

    let written = template::seed_templates(&store, &catalog, today, &mut rng).await?;
    tracing::info!(templates = written, "Import templates seeded");
    Ok(())
}

async fn run_migrate() -> Result<()> {
    let pool = connect().await?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations applied");
    Ok(())
}

async fn run_export(out: PathBuf) -> Result<()> {
    let store = PgStore::new(connect().await?);
    let csv = export::export_projects_csv(&store).await?;
    tokio::fs::write(&out, &csv)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;
    tracing::info!(file = %out.display(), bytes = csv.len(), "Projects exported");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "importer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    match args.command {
        Command::Import {
            file,
            project_type,
            format,
            dry_run,
        } => run_import(file, project_type, format, dry_run).await,
        Command::SeedTemplates => run_seed_templates().await,
        Command::Migrate => run_migrate().await,
        Command::Export { out } => run_export(out).await,
    }
}
