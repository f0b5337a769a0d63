//! flag-extractor - Command-line front end for the boss tracker
//!
//! Every command prints one JSON document on stdout. Failures print a JSON
//! `{"error": kind, "message": ...}` object on stderr, leave stdout empty and
//! exit with a code identifying the failure class.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use thiserror::Error;

use sl2_boss_tracker::service::{event_key, parse_event_id};
use sl2_boss_tracker::{
    BossDataError, BossDataset, BossStatusService, ConfigError, FlagOffsetTable, ServiceError,
    StatusMonitor, TrackerConfig,
};

const EXIT_FAILURE: u8 = 1;
const EXIT_NOT_FOUND: u8 = 2;
const EXIT_CORRUPT: u8 = 3;
const EXIT_INVALID_SLOT: u8 = 4;
const EXIT_OFFSET_TABLE: u8 = 5;
const EXIT_CONFIG: u8 = 6;
const EXIT_USAGE: u8 = 64;

#[derive(Parser)]
#[command(
    name = "flag-extractor",
    about = "Read boss defeat flags and character stats from SL2 save files",
    long_about = None,
    after_help = "EXAMPLES:
    # Status of two bosses in slot 0
    flag-extractor get-full-status --save-file-path ER0000.sl2 --slot-index 0 --event-ids 10000800,10000850

    # Occupied character slots
    flag-extractor list-characters --save-file-path ER0000.sl2

    # Full boss report from a dataset
    flag-extractor boss-report --save-file-path ER0000.sl2 --slot-index 0 --bosses bosses.json"
)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(global = true, long, env = "FLAG_EXTRACTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Offset table path, overrides the configuration
    #[arg(global = true, long)]
    offset_table: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(global = true, short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flag statuses for a list of event ids plus character stats
    GetFullStatus {
        #[arg(long)]
        save_file_path: PathBuf,
        #[arg(long)]
        slot_index: u32,
        /// Comma separated event ids
        #[arg(long, default_value = "")]
        event_ids: String,
    },
    /// Occupied character slots
    ListCharacters {
        #[arg(long)]
        save_file_path: PathBuf,
    },
    /// Status of a single event flag
    CheckFlag {
        #[arg(long)]
        save_file_path: PathBuf,
        #[arg(long)]
        slot_index: u32,
        #[arg(long)]
        event_id: String,
    },
    /// Boss dataset with defeat state applied
    BossReport {
        #[arg(long)]
        save_file_path: PathBuf,
        #[arg(long)]
        slot_index: u32,
        /// Boss dataset JSON
        #[arg(long)]
        bosses: PathBuf,
    },
    /// Poll the save file and print one line per change
    Watch {
        #[arg(long)]
        save_file_path: PathBuf,
        #[arg(long)]
        slot_index: u32,
        /// Boss dataset JSON
        #[arg(long)]
        bosses: PathBuf,
        /// Seconds between polls, overrides the configuration
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("boss dataset {}: {}", .path.display(), .source)]
    Bosses {
        path: PathBuf,
        #[source]
        source: BossDataError,
    },
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    fn kind(&self) -> &'static str {
        match self {
            CliError::Usage(_) => "usage",
            CliError::Config(_) => "config",
            CliError::Service(e) => e.kind(),
            CliError::Bosses {
                source: BossDataError::Io(e),
                ..
            } if e.kind() == std::io::ErrorKind::NotFound => "file_not_found",
            CliError::Bosses { .. } => "boss_data",
            CliError::Output(_) => "output",
        }
    }

    fn exit_code(&self) -> u8 {
        match self.kind() {
            "usage" => EXIT_USAGE,
            "config" => EXIT_CONFIG,
            "file_not_found" => EXIT_NOT_FOUND,
            "container_too_small" | "invalid_layout" | "decode" => EXIT_CORRUPT,
            "invalid_slot" => EXIT_INVALID_SLOT,
            "offset_table" => EXIT_OFFSET_TABLE,
            _ => EXIT_FAILURE,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // stderr is the only reporting channel; if it is gone the exit code still carries the failure
            let _ = e.print();
            return ExitCode::from(parse_error_exit_code(&e));
        }
    };

    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("Command failed: {:?}", e);
            eprintln!("{}", json!({ "error": e.kind(), "message": e.to_string() }));
            ExitCode::from(e.exit_code())
        }
    }
}

/// Help and version output exit cleanly; anything else is a usage error
fn parse_error_exit_code(e: &clap::Error) -> u8 {
    if e.use_stderr() {
        EXIT_USAGE
    } else {
        0
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = match &cli.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };
    if let Some(path) = cli.offset_table {
        config.offset_table_path = path;
    }

    match cli.command {
        Commands::GetFullStatus {
            save_file_path,
            slot_index,
            event_ids,
        } => {
            let event_ids = parse_event_id_list(&event_ids)?;
            let service = build_service(&config)?;
            let result = service.get_full_status(&save_file_path, slot_index, event_ids)?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Commands::ListCharacters { save_file_path } => {
            // Listing needs no offset table
            let service = BossStatusService::new(Arc::new(FlagOffsetTable::default()), &config);
            let characters = service.list_characters(&save_file_path)?;
            println!("{}", serde_json::to_string(&characters)?);
        }
        Commands::CheckFlag {
            save_file_path,
            slot_index,
            event_id,
        } => {
            let event_id = parse_event_id(&event_id)
                .ok_or_else(|| CliError::Usage(format!("invalid event id '{}'", event_id)))?;
            let service = build_service(&config)?;
            let status = service.is_event_flag_set(&save_file_path, slot_index, event_id)?;
            println!(
                "{}",
                json!({ "event_id": event_key(event_id), "status": status })
            );
        }
        Commands::BossReport {
            save_file_path,
            slot_index,
            bosses,
        } => {
            let mut dataset = load_bosses(&bosses, &config)?;
            let service = build_service(&config)?;
            let result = service.get_full_status(&save_file_path, slot_index, dataset.all_event_ids())?;
            dataset.apply_statuses(&result);

            let (defeated, total) = dataset.counts();
            println!(
                "{}",
                serde_json::to_string(&json!({
                    "stats": result.stats,
                    "defeated": defeated,
                    "total": total,
                    "bosses": dataset,
                }))?
            );
        }
        Commands::Watch {
            save_file_path,
            slot_index,
            bosses,
            interval,
        } => {
            let dataset = load_bosses(&bosses, &config)?;
            let service = build_service(&config)?;
            let interval = Duration::from_secs(interval.unwrap_or(config.poll_interval_secs).max(1));
            watch(service, dataset, &save_file_path, slot_index, interval)?;
        }
    }

    Ok(())
}

fn watch(
    service: BossStatusService,
    mut dataset: BossDataset,
    save_path: &Path,
    slot_index: u32,
    interval: Duration,
) -> Result<(), CliError> {
    let mut monitor = StatusMonitor::new(service, save_path, slot_index, dataset.all_event_ids());
    log::info!(
        "Watching {} slot {} every {}s",
        save_path.display(),
        slot_index,
        interval.as_secs()
    );

    loop {
        match monitor.poll() {
            Ok(change) if change.changed => {
                if let Some(result) = monitor.last() {
                    dataset.apply_statuses(result);
                }
                let (defeated, total) = dataset.counts();
                println!(
                    "{}",
                    serde_json::to_string(&json!({
                        "change": change,
                        "defeated": defeated,
                        "total": total,
                    }))?
                );
            }
            Ok(_) => {}
            // Never recovers between polls
            Err(e @ ServiceError::InvalidSlot { .. }) => return Err(e.into()),
            Err(e) => {
                log::warn!("Poll failed: {}", e);
                eprintln!("{}", json!({ "error": e.kind(), "message": e.to_string() }));
            }
        }
        std::thread::sleep(interval);
    }
}

fn build_service(config: &TrackerConfig) -> Result<BossStatusService, CliError> {
    Ok(BossStatusService::from_config(config)?)
}

fn load_bosses(path: &Path, config: &TrackerConfig) -> Result<BossDataset, CliError> {
    let mut dataset = BossDataset::load(path).map_err(|source| CliError::Bosses {
        path: path.to_path_buf(),
        source,
    })?;
    if !config.location_order.is_empty() {
        let order: Vec<&str> = config.location_order.iter().map(String::as_str).collect();
        dataset.order_locations(&order);
    }
    Ok(dataset)
}

/// Parse a comma separated id list, rejecting any malformed entry
fn parse_event_id_list(value: &str) -> Result<Vec<u64>, CliError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            parse_event_id(part)
                .ok_or_else(|| CliError::Usage(format!("invalid event id '{}' in --event-ids", part)))
        })
        .collect()
}
