//! chunkrec command-line interface
//!
//! Records audio, screen or camera through ffmpeg and rotates the output
//! into chunks on a time interval, a size limit, or operator keys.

mod colors;
mod commands;
mod config;
mod exit_codes;
mod ffmpeg;
mod parse;
mod platform;

use chunkrec_common::logging;
use clap::{Args, Parser, Subcommand};
use exit_codes::ExitCode;
use platform::CaptureMode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// chunkrec - chunked recording CLI
#[derive(Parser, Debug)]
#[command(name = "chunkrec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print finished chunks as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Suppress status output (chunk paths are still printed)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a recording
    Record {
        #[command(subcommand)]
        mode: RecordMode,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
enum RecordMode {
    /// Record the default (or given) audio input
    Audio {
        #[command(flatten)]
        options: RecordOptions,
    },
    /// Record the screen
    Screen {
        /// Capture frame rate
        #[arg(long, default_value_t = platform::DEFAULT_FPS)]
        fps: u32,

        #[command(flatten)]
        options: RecordOptions,
    },
    /// Record a camera
    Camera {
        /// Capture frame rate
        #[arg(long, default_value_t = platform::DEFAULT_FPS)]
        fps: u32,

        #[command(flatten)]
        options: RecordOptions,
    },
}

impl RecordMode {
    fn into_parts(self) -> (CaptureMode, RecordOptions) {
        match self {
            RecordMode::Audio { options } => (CaptureMode::Audio, options),
            RecordMode::Screen { fps, options } => (CaptureMode::Screen { fps }, options),
            RecordMode::Camera { fps, options } => (CaptureMode::Camera { fps }, options),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RecordOptions {
    /// Output file or directory (a trailing separator forces a directory)
    #[arg(short, long)]
    pub(crate) output: Option<String>,

    /// File name template: strftime codes plus {chunk} and {uuid}
    #[arg(short, long)]
    pub(crate) template: Option<String>,

    /// Container extension, e.g. mp4, mkv, m4a, wav
    #[arg(short, long)]
    pub(crate) format: Option<String>,

    /// Stop after this many seconds
    #[arg(short, long, value_parser = parse::seconds)]
    pub(crate) duration: Option<f64>,

    /// Start a new chunk every this many seconds
    #[arg(long, value_parser = parse::seconds)]
    pub(crate) split: Option<f64>,

    /// Stop once a chunk reaches this size (e.g. 500M, 2G)
    #[arg(long, value_parser = parse::byte_size)]
    pub(crate) max_size: Option<u64>,

    /// Key that stops the recording (default: q)
    #[arg(long)]
    pub(crate) stop_key: Option<String>,

    /// Disable the stop key
    #[arg(long, conflicts_with = "stop_key")]
    pub(crate) no_stop_key: bool,

    /// Key that pauses the recording (toggles unless --resume-key is given)
    #[arg(long)]
    pub(crate) pause_key: Option<String>,

    /// Key that resumes a paused recording
    #[arg(long)]
    pub(crate) resume_key: Option<String>,

    /// Replace existing files
    #[arg(long)]
    pub(crate) overwrite: bool,

    /// Capture device (platform specific)
    #[arg(long)]
    pub(crate) device: Option<String>,

    /// Path to the ffmpeg binary
    #[arg(long)]
    pub(crate) ffmpeg: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let log_guard = init_logging(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            std::process::exit(ExitCode::GeneralError.as_i32());
        }
    };

    let exit_code = runtime.block_on(run(cli));

    // process::exit skips destructors; flush ffmpeg teardown and logs first.
    drop(runtime);
    drop(log_guard);
    std::process::exit(exit_code.as_i32());
}

/// Log to a daily rolling file, or to stderr when no log directory exists.
fn init_logging(verbose: bool) -> Option<WorkerGuard> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match logging::ensure_log_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, logging::LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("warn"))
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

async fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Commands::Record { mode } => {
            let (mode, options) = mode.into_parts();
            commands::record(mode, options, cli.json, cli.quiet).await
        }
        Commands::Version => {
            commands::version(cli.json);
            ExitCode::Success
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn record_options(args: &[&str]) -> RecordOptions {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Record { mode } => mode.into_parts().1,
            _ => panic!("Expected Record command"),
        }
    }

    /// Verify the CLI definition is valid
    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_record_audio_defaults() {
        let cli = Cli::try_parse_from(["chunkrec", "record", "audio"]).unwrap();
        assert!(!cli.json);
        assert!(!cli.quiet);
        assert!(!cli.verbose);
        match cli.command {
            Commands::Record {
                mode: RecordMode::Audio { options },
            } => {
                assert!(options.output.is_none());
                assert!(options.duration.is_none());
                assert!(options.stop_key.is_none());
                assert!(!options.no_stop_key);
                assert!(!options.overwrite);
            }
            _ => panic!("Expected Record Audio command"),
        }
    }

    #[test]
    fn parse_record_screen_with_options() {
        let options = record_options(&[
            "chunkrec",
            "record",
            "screen",
            "-o",
            "/tmp/recordings/",
            "-d",
            "90.5",
            "--split",
            "30",
            "--max-size",
            "500M",
            "--pause-key",
            "p",
        ]);
        assert_eq!(options.output.as_deref(), Some("/tmp/recordings/"));
        assert_eq!(options.duration, Some(90.5));
        assert_eq!(options.split, Some(30.0));
        assert_eq!(options.max_size, Some(500 * 1024 * 1024));
        assert_eq!(options.pause_key.as_deref(), Some("p"));
    }

    #[test]
    fn parse_version() {
        let cli = Cli::try_parse_from(["chunkrec", "version"]).unwrap();
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["chunkrec", "record", "audio", "--json", "-q"]).unwrap();
        assert!(cli.json);
        assert!(cli.quiet);
    }

    #[test]
    fn parse_invalid_command() {
        assert!(Cli::try_parse_from(["chunkrec", "invalid"]).is_err());
        assert!(Cli::try_parse_from(["chunkrec", "record"]).is_err());
    }

    #[test]
    fn parse_rejects_bad_numbers() {
        assert!(Cli::try_parse_from(["chunkrec", "record", "audio", "-d", "soon"]).is_err());
        assert!(Cli::try_parse_from(["chunkrec", "record", "audio", "--max-size", "10X"]).is_err());
        assert!(Cli::try_parse_from(["chunkrec", "record", "screen", "--fps", "-1"]).is_err());
    }

    #[test]
    fn parse_stop_key_conflicts_with_no_stop_key() {
        let result = Cli::try_parse_from([
            "chunkrec",
            "record",
            "audio",
            "--stop-key",
            "x",
            "--no-stop-key",
        ]);
        assert!(result.is_err());
    }
}
