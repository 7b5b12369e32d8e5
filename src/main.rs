//! # VE.Direct Capture
//!
//! Read one telemetry record (or a stream of them) from a Victron solar charge
//! controller and print it as JSON lines on stdout.
//!
//! Diagnostics go to stderr and, when a log directory is configured, to a
//! daily rolling log file.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use vedirect_capture::config::Config;
use vedirect_capture::error::{VeDirectError, EXIT_FAILURE, MAX_STATE_EXIT_CODE};
use vedirect_capture::telemetry::{capture_once, Poller, Sample};

/// Prefix of the daily rolling log files
const LOG_FILE_PREFIX: &str = "vedirect-capture.log";

/// Capture telemetry from a Victron charge controller over VE.Direct
#[derive(Parser, Debug)]
#[command(name = "vedirect-capture", version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device of the VE.Direct port
    #[arg(short = 's', long)]
    device: Option<String>,

    /// Enable debug diagnostics
    #[arg(short, long)]
    verbose: bool,

    /// Reject blocks with a bad checksum
    #[arg(long)]
    validate_checksum: bool,

    /// Capture repeatedly every N milliseconds
    #[arg(long, value_name = "N")]
    interval_ms: Option<u64>,

    /// Stop polling after N captures
    #[arg(long, value_name = "N")]
    count: Option<u64>,
}

impl Cli {
    /// Load the configuration file (or defaults) and apply command line overrides
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(device) = &self.device {
            config.serial.port = device.clone();
        }
        if self.validate_checksum {
            config.decoder.validate_checksum = true;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.poll.interval_ms = interval_ms;
        }

        config.validate()?;

        if self.count.is_some() && !config.is_polling() {
            bail!("--count requires a poll interval (--interval-ms or [poll] interval_ms)");
        }

        Ok(config)
    }
}

/// Daily rolling log file appender in `directory`
///
/// # Errors
///
/// Returns error if the directory cannot be created or written
fn file_appender(directory: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(directory)
        .with_context(|| format!("cannot log to directory {}", directory))
}

/// Install the stderr subscriber, plus a rolling file layer if configured
///
/// The returned guard flushes the file writer on drop and must be held until
/// the process exits.
fn init_logging(verbose: bool, log_directory: Option<&str>) -> Result<Option<WorkerGuard>> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    match log_directory {
        Some(directory) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(directory)?);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            Ok(None)
        }
    }
}

/// Exit code of a successful single capture: the operational state code
///
/// Capped below the failure codes so success never reads as failure.
fn state_exit_code(sample: &Sample) -> u8 {
    sample
        .record
        .operational_state()
        .map_or(0, |state| state.clamp(0, i64::from(MAX_STATE_EXIT_CODE)) as u8)
}

/// Exit code for an error that ended the run
fn failure_exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<VeDirectError>()
        .map_or(EXIT_FAILURE, VeDirectError::exit_code)
}

fn print_sample(sample: &Sample) {
    match sample.to_json_line() {
        Ok(line) => println!("{}", line),
        Err(e) => error!("Failed to serialize sample: {}", e),
    }
}

/// Capture once and print the record
async fn run_once(config: &Config) -> Result<u8> {
    let sample = capture_once(config).await?;
    println!("{}", sample.to_json_line()?);
    Ok(state_exit_code(&sample))
}

/// Capture on an interval until Ctrl+C (or `--count` captures)
async fn run_polling(config: &Config, count: Option<u64>) -> Result<u8> {
    let mut poller = Poller::from_config(config);
    if let Some(count) = count {
        poller = poller.with_max_iterations(count);
    }

    info!("Press Ctrl+C to exit");

    let stats = poller
        .run(
            || capture_once(config),
            print_sample,
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            },
        )
        .await;

    debug!("Poll statistics: {:?}", stats);
    Ok(0)
}

/// Main entry point for VE.Direct capture
///
/// # Control Flow
///
/// 1. Parse the command line and resolve the configuration
/// 2. Set up logging (stderr, optional rolling file)
/// 3. Single shot: capture one record, print it, exit with its `CS` code
/// 4. Poll mode: capture every `interval_ms` until Ctrl+C
///
/// # Exit Codes
///
/// - Single shot success: operational state code (0 if not transmitted),
///   at most 252
/// - 253: usage, configuration or other failure
/// - 254: no usable block in the capture
/// - 255: serial capture failure
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version also arrive here
            return if e.use_stderr() {
                ExitCode::from(EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("vedirect-capture: {:#}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let _guard = match init_logging(cli.verbose, config.log_directory()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("vedirect-capture: {:#}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    info!("VE.Direct capture v{} starting on {}", env!("CARGO_PKG_VERSION"), config.serial.port);

    let result = if config.is_polling() {
        run_polling(&config, cli.count).await
    } else {
        run_once(&config).await
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(failure_exit_code(&e))
        }
    }
}
