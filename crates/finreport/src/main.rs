//! finreport CLI: download, import and pivot financial statement tables.
//!
//! Commands:
//! - `download` - stage statement files for the selected securities
//! - `import` - normalize staged files and load them into SQLite
//! - `views` - build one pivot view per statement table
//! - `tables` - list the statement tables the source serves
//! - `reference import` - load markets, securities and sectors from JSON
//! - `show` - print the pivot view of one table for one security

use anyhow::{Context, Result};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use finreport::{
    ColumnDiscovery, LoadMode, MarkerColumnFormat, NeteaseSource, PipelineConfig,
    ReferenceData, ReferenceSnapshot, ReportPipeline, ReportStore, SecurityCode, SqliteStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "finreport",
    version,
    about = "Financial statement ETL: download, normalize, load and pivot"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML configuration file.
    #[arg(long, env = "FINREPORT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the configuration.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Staging directory, overriding the configuration.
    #[arg(long, global = true)]
    staging: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Which securities and tables a command works on.
#[derive(Args)]
struct Selection {
    /// Security codes, or sector codes with --by-plate. Empty means the whole default market.
    identifiers: Vec<String>,

    /// Treat identifiers as sector (plate) codes.
    #[arg(long, default_value_t = false)]
    by_plate: bool,

    /// Limit to these statement tables (repeatable). Defaults to all.
    #[arg(long = "table")]
    tables: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download statement files into the staging area.
    Download {
        #[command(flatten)]
        selection: Selection,

        /// Fetch again even if a file is already staged.
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Normalize staged files and load them into the database.
    Import {
        #[command(flatten)]
        selection: Selection,

        /// Append to existing tables instead of replacing them.
        #[arg(long, visible_alias = "update", default_value_t = false)]
        append: bool,
    },
    /// Build one pivot view per statement table.
    Views {
        /// Discover columns from every loaded row instead of the representative security.
        #[arg(long, default_value_t = false)]
        scan_all: bool,

        /// Limit to these statement tables (repeatable). Defaults to all.
        #[arg(long = "table")]
        tables: Vec<String>,
    },
    /// List the statement tables the source serves.
    Tables,
    /// Reference data commands.
    Reference {
        #[command(subcommand)]
        action: ReferenceAction,
    },
    /// Print the pivot view of a table for one security.
    Show {
        /// Statement table name or file stem.
        table: String,

        /// Security code, e.g. sh600000.
        security: String,
    },
}

#[derive(Subcommand)]
enum ReferenceAction {
    /// Load markets, securities and sectors from a JSON snapshot.
    Import {
        /// Path to the JSON file.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(database) = cli.database {
        config.database = database;
    }
    if let Some(staging) = cli.staging {
        config.staging_root = staging;
    }

    let store = Arc::new(
        SqliteStore::new(&config.database)
            .with_context(|| format!("opening database {}", config.database.display()))?,
    );

    if let Commands::Reference {
        action: ReferenceAction::Import { path },
    } = &command
    {
        return import_reference(&store, path);
    }

    let format = MarkerColumnFormat::new().with_encoding_label(&config.encoding)?;
    let source = NeteaseSource::new(&config.user_agent, config.timeout())?.with_format(format);
    let reference: Arc<dyn ReferenceData> = store.clone();
    let report_store: Arc<dyn ReportStore> = store;
    let pipeline = ReportPipeline::new(Arc::new(source), report_store, reference, config);

    match command {
        Commands::Download {
            selection,
            overwrite,
        } => {
            let tables = pipeline.tables(&selection.tables)?;
            let securities = pipeline
                .resolve(&selection.identifiers, selection.by_plate)
                .await?;
            info!(
                securities = securities.len(),
                tables = tables.len(),
                "Starting download"
            );
            pipeline
                .download(&securities, &tables, overwrite)
                .await
                .log("download");
        }
        Commands::Import { selection, append } => {
            let tables = pipeline.tables(&selection.tables)?;
            let securities = pipeline
                .resolve(&selection.identifiers, selection.by_plate)
                .await?;
            let mode = if append {
                LoadMode::Append
            } else {
                LoadMode::Replace
            };
            pipeline
                .import(&securities, &tables, mode)
                .await?
                .log("import");
        }
        Commands::Views { scan_all, tables } => {
            let tables = pipeline.tables(&tables)?;
            let discovery = if scan_all {
                ColumnDiscovery::LoadedTable
            } else {
                ColumnDiscovery::Representative
            };
            pipeline.build_views(&tables, discovery).await.log("views");
        }
        Commands::Tables => {
            for table in pipeline.tables(&[])? {
                println!("{:<22} {:<8} {}", table.name, table.file, table.label);
            }
        }
        Commands::Show { table, security } => {
            let security = SecurityCode::new(security);
            let frame = pipeline.view(&table, Some(&security)).await?;
            println!("{frame}");
        }
        Commands::Reference { .. } => {}
    }

    Ok(())
}

fn import_reference(store: &SqliteStore, path: &Path) -> Result<()> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let snapshot: ReferenceSnapshot =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let rows = store.import_reference(&snapshot)?;
    info!(
        markets = snapshot.markets.len(),
        securities = snapshot.securities.len(),
        sectors = snapshot.sectors.len(),
        rows,
        "Imported reference data"
    );
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
