//! wma2mp3
//!
//! Mirrors a directory tree of WMA files into MP3, keeping the source
//! bitrate and tags.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wma2mp3::config::{ConverterConfig, LogFormat, LoggingConfig};
use wma2mp3::error::{ConvertError, Result};
use wma2mp3::ffmpeg::FfmpegFramework;
use wma2mp3::Walker;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "wma2mp3";

/// Convert every WMA file under a directory to MP3.
#[derive(Parser, Debug, Clone)]
#[command(name = "wma2mp3")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory to read WMA files from.
    source: PathBuf,

    /// Directory to write the mirrored MP3 tree into.
    destination: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured by the file that failed; use defaults.
            init_logging(&LoggingConfig::default());
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging);
    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    tracing::debug!("Configuration loaded: {:?}", config);

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Conversion aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Configuration from `path`, or the defaults when no file was named. A named
/// file that cannot be loaded is an error.
fn load_config(path: Option<&Path>) -> Result<ConverterConfig> {
    match path {
        Some(path) => ConverterConfig::from_file(path).map_err(|e| {
            ConvertError::Config(format!("Failed to load config file {}: {}", path.display(), e))
        }),
        None => Ok(ConverterConfig::default()),
    }
}

fn run(args: &Args, config: &ConverterConfig) -> Result<()> {
    if !args.source.is_dir() {
        return Err(ConvertError::NotADirectory(args.source.clone()));
    }

    let framework = FfmpegFramework::startup()?;
    let summary = Walker::new(&framework, config).run(&args.source, &args.destination)?;

    tracing::info!(
        files = summary.files_converted,
        directories = summary.directories_visited,
        "Conversion complete"
    );
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "wma2mp3={level},ffmpeg={level}",
            level = logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
