// shipdash CLI - headless trigger surface for pipeline runs.
// One `run` invocation executes exactly one pipeline run; callers must
// serialize invocations against the same database.

mod exit_codes;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shipdash_pipeline::{PipelineConfig, PipelineError, RunId, Sources, StageStatus};
use shipdash_store::TableStore;

use exit_codes::{EXIT_CONFIG, EXIT_ERROR, EXIT_SHOW_TABLE, EXIT_STAGE, EXIT_SUCCESS, EXIT_USAGE};

struct CliError {
    code: u8,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(code: u8, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        let code = match e {
            PipelineError::Config(_) => EXIT_CONFIG,
            PipelineError::Stage { .. } => EXIT_STAGE,
        };
        CliError::new(code, e.to_string())
    }
}

#[derive(Parser)]
#[command(name = "shipdash")]
#[command(about = "Shipping-data ETL pipeline (single-machine batch runs)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute exactly one pipeline run
    #[command(after_help = "\
Examples:
  shipdash run
  shipdash run --config pipeline.toml
  PIPELINE_RUN_ID=nightly-2026-08-05 shipdash run --csv data/raw/shipping_data.csv")]
    Run {
        /// Path to a TOML config file (all settings have defaults)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the primary CSV path
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Override the result database path
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Validate a config file without running
    Check {
        /// Path to the TOML config file
        config: PathBuf,
    },

    /// Print a persisted result table as CSV
    #[command(after_help = "\
Examples:
  shipdash show master_shipping_data
  shipdash show fuel_prices --db data/shipdash.db")]
    Show {
        /// Table name (shipping_stats, fuel_prices, weather_data, master_shipping_data)
        table: String,

        /// Result database path (defaults to the configured path)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match dispatch(cli.command) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: {}", e.message);
            if let Some(hint) = &e.hint {
                eprintln!("hint: {hint}");
            }
            ExitCode::from(e.code)
        }
    }
}

fn dispatch(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Run { config, csv, db } => cmd_run(config, csv, db),
        Commands::Check { config } => cmd_check(&config),
        Commands::Show { table, db } => cmd_show(&table, db),
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

fn cmd_run(
    config_path: Option<PathBuf>,
    csv: Option<PathBuf>,
    db: Option<PathBuf>,
) -> Result<(), CliError> {
    let mut config = load_config(config_path.as_deref())?;
    if let Some(csv) = csv {
        config.csv_path = csv;
    }
    if let Some(db) = db {
        config.db_path = db;
    }

    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CliError::new(EXIT_ERROR, format!("cannot create {}: {e}", parent.display()))
            })?;
        }
    }

    let run_id = RunId::from_env_or_new();
    let sources = Sources::from_config(&config)?;
    let mut store = TableStore::open(&config.db_path)
        .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;

    let report = shipdash_pipeline::run(sources, &mut store, &config, &run_id)?;

    println!("run {}", report.run_id);
    for (table, rows) in &report.tables {
        println!("  {table}: {rows} rows");
    }
    for outcome in &report.stages {
        if let StageStatus::Degraded(reason) = &outcome.status {
            println!("  degraded {}: {reason}", outcome.stage);
        }
    }
    if report.is_degraded() {
        println!("completed with warnings ({})", report.warnings.len());
    } else {
        println!("completed");
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, CliError> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from("shipdash.toml"), false),
    };

    if !path.exists() {
        if required {
            return Err(
                CliError::new(EXIT_CONFIG, format!("config file not found: {}", path.display()))
                    .with_hint("run without --config to use defaults"),
            );
        }
        return Ok(PipelineConfig::from_toml("")?);
    }

    let input = std::fs::read_to_string(&path).map_err(|e| {
        CliError::new(EXIT_CONFIG, format!("cannot read {}: {e}", path.display()))
    })?;
    Ok(PipelineConfig::from_toml(&input)?)
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

fn cmd_check(config_path: &Path) -> Result<(), CliError> {
    let input = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::new(EXIT_CONFIG, format!("cannot read {}: {e}", config_path.display()))
    })?;
    let config = PipelineConfig::from_toml(&input)?;
    println!("config ok");
    println!("  csv_path: {}", config.csv_path.display());
    println!("  db_path: {}", config.db_path.display());
    println!("  fuel_url: {}", config.sources.fuel_url);
    println!("  population_url: {}", config.sources.population_url);
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn cmd_show(table: &str, db: Option<PathBuf>) -> Result<(), CliError> {
    let db_path = match db {
        Some(path) => path,
        None => load_config(None)?.db_path,
    };
    if !db_path.exists() {
        return Err(
            CliError::new(EXIT_USAGE, format!("database not found: {}", db_path.display()))
                .with_hint("run `shipdash run` first"),
        );
    }

    let store = TableStore::open(&db_path)
        .map_err(|e| CliError::new(EXIT_SHOW_TABLE, e.to_string()))?;
    let rows = store
        .read_table(table)
        .map_err(|e| CliError::new(EXIT_SHOW_TABLE, e.to_string()))?;

    let mut writer = csv::Writer::from_writer(std::io::stdout().lock());
    if let Some(first) = rows.first() {
        let header: Vec<&str> = first.keys().map(String::as_str).collect();
        writer
            .write_record(&header)
            .map_err(|e| CliError::new(EXIT_SHOW_TABLE, format!("CSV write error: {e}")))?;
        for row in &rows {
            let record: Vec<String> = row.values().map(|v| v.to_string()).collect();
            writer
                .write_record(&record)
                .map_err(|e| CliError::new(EXIT_SHOW_TABLE, format!("CSV write error: {e}")))?;
        }
    }
    writer
        .flush()
        .map_err(|e| CliError::new(EXIT_SHOW_TABLE, format!("CSV flush error: {e}")))?;
    Ok(())
}
