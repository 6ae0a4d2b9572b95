// # watermark - meta log command-line front end
//
// This binary is a THIN integration layer over watermark-core:
// - DO NOT add gap or merge logic here; it belongs in the core
// - Store configuration is via environment variables ONLY
// - Results go to stdout as JSON, logs go to stderr
//
// ## Configuration
//
// ### Store
// - `WATERMARK_STORE_TYPE`: Type of blob store (file, memory). Default: file
// - `WATERMARK_STORE_ROOT`: Root directory (required for file)
//
// ### Meta log
// - `WATERMARK_META_KEY`: Key of the meta log. Default: meta_file.csv
// - `WATERMARK_WRITE_MODE`: overwrite or conditional. Default: overwrite
// - `WATERMARK_SOURCE_DATE_COLUMN`: Default: source_date
// - `WATERMARK_PROCESSED_AT_COLUMN`: Default: datetime_of_processing
//
// ### Logging
// - `WATERMARK_LOG_LEVEL`: trace, debug, info, warn, error. Default: info
//
// ## Example
//
// ```bash
// export WATERMARK_STORE_ROOT=/var/lib/watermark
// export WATERMARK_META_KEY=trades/meta_file.csv
//
// watermark resolve 2021-04-12
// watermark merge 2021-04-12 2021-04-13
// watermark show
// ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::env;
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use watermark_core::meta::{self, LogLookup, MetaSchema, RawTable};
use watermark_core::{
    GapResolver, LogMerger, MergeOutcome, Resolution, StoreConfig, WatermarkConfig, WriteMode,
    open_store,
};

/// Exit codes for the different failure classes
///
/// - 0: Success
/// - 1: Configuration or startup error
/// - 2: Runtime error (storage, I/O)
/// - 3: Malformed meta log or malformed input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatermarkExitCode {
    /// Command completed
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
    /// The meta log or the given dates are malformed
    MalformedData = 3,
}

impl From<WatermarkExitCode> for ExitCode {
    fn from(code: WatermarkExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl WatermarkExitCode {
    /// Classify a failed command
    fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<watermark_core::Error>() {
            Some(core) if core.is_malformed_schema() || core.is_malformed_input() => {
                WatermarkExitCode::MalformedData
            }
            Some(watermark_core::Error::Config(_)) => WatermarkExitCode::ConfigError,
            _ => WatermarkExitCode::RuntimeError,
        }
    }
}

#[derive(Parser)]
#[command(name = "watermark")]
#[command(about = "Resolve and record processed dates in a meta log", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the watermark and the dates still to process
    Resolve {
        /// Earliest date of interest (YYYY-MM-DD)
        first_date: String,
    },

    /// Record processed dates in the meta log
    Merge {
        /// Processed dates (YYYY-MM-DD); none is a no-op
        dates: Vec<String>,
    },

    /// Print the rows of the meta log
    Show,
}

/// Application configuration
#[derive(Debug)]
struct Config {
    store_type: String,
    store_root: Option<String>,
    meta_key: String,
    write_mode: String,
    source_date_column: Option<String>,
    processed_at_column: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable lookup
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            store_type: lookup("WATERMARK_STORE_TYPE").unwrap_or_else(|| "file".to_string()),
            store_root: lookup("WATERMARK_STORE_ROOT"),
            meta_key: lookup("WATERMARK_META_KEY").unwrap_or_else(|| "meta_file.csv".to_string()),
            write_mode: lookup("WATERMARK_WRITE_MODE").unwrap_or_else(|| "overwrite".to_string()),
            source_date_column: lookup("WATERMARK_SOURCE_DATE_COLUMN"),
            processed_at_column: lookup("WATERMARK_PROCESSED_AT_COLUMN"),
            log_level: lookup("WATERMARK_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Validate and convert into the core configuration
    fn validate(&self) -> Result<WatermarkConfig> {
        let store = match self.store_type.to_lowercase().as_str() {
            "file" => match self.store_root.as_deref() {
                Some(root) if !root.trim().is_empty() => StoreConfig::File {
                    root: root.to_string(),
                },
                _ => anyhow::bail!(
                    "WATERMARK_STORE_ROOT is required when WATERMARK_STORE_TYPE=file. \
                    Set it via: export WATERMARK_STORE_ROOT=/var/lib/watermark"
                ),
            },
            "memory" => StoreConfig::Memory,
            _ => anyhow::bail!(
                "WATERMARK_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        };

        let write_mode: WriteMode = self.write_mode.parse()?;

        let defaults = MetaSchema::default();
        let schema = MetaSchema::new(
            self.source_date_column
                .clone()
                .unwrap_or(defaults.source_date_column),
            self.processed_at_column
                .clone()
                .unwrap_or(defaults.processed_at_column),
        );

        self.level()?;

        let config = WatermarkConfig::new(store)
            .with_meta_key(self.meta_key.clone())
            .with_schema(schema)
            .with_write_mode(write_mode);
        config.validate()?;
        Ok(config)
    }

    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "WATERMARK_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResolveOutput {
    min_date: String,
    dates: Vec<String>,
}

impl From<&Resolution> for ResolveOutput {
    fn from(resolution: &Resolution) -> Self {
        Self {
            min_date: resolution.min_date_string(),
            dates: resolution.date_strings(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MergeOutput {
    outcome: &'static str,
    rows_added: usize,
    total_rows: Option<usize>,
    version: Option<String>,
}

impl From<&MergeOutcome> for MergeOutput {
    fn from(outcome: &MergeOutcome) -> Self {
        match outcome {
            MergeOutcome::Skipped => Self {
                outcome: "skipped",
                rows_added: 0,
                total_rows: None,
                version: None,
            },
            MergeOutcome::Created { rows, version } => Self {
                outcome: "created",
                rows_added: *rows,
                total_rows: Some(*rows),
                version: Some(version.to_string()),
            },
            MergeOutcome::Appended {
                rows,
                total,
                version,
            } => Self {
                outcome: "appended",
                rows_added: *rows,
                total_rows: Some(*total),
                version: Some(version.to_string()),
            },
        }
    }
}

/// The meta log as stored; cells are not reinterpreted
#[derive(Debug, Serialize)]
struct ShowOutput {
    meta_key: String,
    exists: bool,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ShowOutput {
    fn new(meta_key: &str, table: Option<RawTable>) -> Self {
        let exists = table.is_some();
        let RawTable { columns, rows } = table.unwrap_or_default();
        Self {
            meta_key: meta_key.to_string(),
            exists,
            columns,
            rows,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load and validate configuration from environment
    let env_config = Config::from_env();
    let config = match env_config.validate() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return WatermarkExitCode::ConfigError.into();
        }
    };

    // Initialize tracing on stderr; stdout carries the JSON result
    let log_level = env_config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WatermarkExitCode::ConfigError.into();
    }

    info!(
        "Using {} store, meta log {}",
        config.store.type_name(),
        config.meta_key
    );

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WatermarkExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(run(cli.cmd, &config));

    match result {
        Ok(output) => {
            println!("{}", output);
            WatermarkExitCode::Success.into()
        }
        Err(e) => {
            error!("{:#}", e);
            WatermarkExitCode::for_error(&e).into()
        }
    }
}

/// Run one subcommand and render its JSON result
async fn run(cmd: Commands, config: &WatermarkConfig) -> Result<String> {
    let store = open_store(&config.store).await?;
    if matches!(config.store, StoreConfig::Memory) {
        warn!("Memory store selected: nothing persists after this command");
    }

    let output = match cmd {
        Commands::Resolve { first_date } => {
            let resolution = GapResolver::from_config(store, config)
                .resolve(&first_date)
                .await?;
            serde_json::to_string_pretty(&ResolveOutput::from(&resolution))?
        }
        Commands::Merge { dates } => {
            let outcome = LogMerger::from_config(store, config).merge(&dates).await?;
            serde_json::to_string_pretty(&MergeOutput::from(&outcome))?
        }
        Commands::Show => {
            let lookup =
                meta::read_table(store.as_ref(), &config.meta_key, &config.schema, config.format)
                    .await?;
            let table = match lookup {
                LogLookup::Found { table, .. } => Some(table),
                LogLookup::NotFound => {
                    info!("No meta log at {}", config.meta_key);
                    None
                }
                LogLookup::Malformed { columns } => {
                    return Err(watermark_core::Error::SchemaLookup {
                        key: config.meta_key.clone(),
                        expected: config.schema.columns(),
                        found: columns,
                    }
                    .into());
                }
            };
            serde_json::to_string_pretty(&ShowOutput::new(&config.meta_key, table))?
        }
    };

    Ok(output)
}
