//! CLI command implementations.

use crate::colors;
use crate::config::{self, Settings};
use crate::exit_codes::ExitCode;
use crate::ffmpeg::{self, FfmpegSession};
use crate::platform::{self, CaptureMode};
use crate::RecordOptions;
use chunkrec_common::{
    parse_key, ChunkRecord, Interrupt, KeySet, RecordError, RecordingConfiguration,
    RecordingEvent, RecordingLoopController, RecordingOptions, TerminalKeys, ValidationError,
};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use tracing::{info, warn};

/// Record until a stop condition ends the run.
pub async fn record(mode: CaptureMode, options: RecordOptions, json: bool, quiet: bool) -> ExitCode {
    let settings = config::load_settings();

    match record_chunks(mode, &options, &settings, json, quiet).await {
        Ok(records) => {
            info!("Recording finished with {} chunk(s)", records.len());
            ExitCode::Success
        }
        Err(e) => {
            if !quiet {
                colors::status_line(&colors::error(&e.to_string()));
            }
            warn!("Recording failed: {}", e);
            ExitCode::from(&e)
        }
    }
}

async fn record_chunks(
    mode: CaptureMode,
    options: &RecordOptions,
    settings: &Settings,
    json: bool,
    quiet: bool,
) -> Result<Vec<ChunkRecord>, RecordError> {
    let config = build_configuration(mode, options, settings)?;
    let input_args = platform::input_args(mode, options.device.as_deref())?;
    let output_args = platform::output_args(mode, config.extension());

    if matches!(mode, CaptureMode::Screen { .. }) && platform::is_wayland_session() && !quiet {
        colors::status_line(&colors::warning(&format!(
            "{} is a Wayland session; x11grab only captures XWayland windows.",
            platform::desktop_name().unwrap_or_else(|| "This desktop".to_string())
        )));
    }

    let ffmpeg_path = options.ffmpeg.as_deref().or(settings.ffmpeg.path.as_deref());
    let ffmpeg = ffmpeg::locate_ffmpeg(ffmpeg_path)?;
    info!(mode = mode.name(), ffmpeg = %ffmpeg.display(), "Starting recording");

    let interrupt = Interrupt::new();
    install_signal_handlers(interrupt.clone());

    if !quiet {
        print_hints(&config);
    }

    let session = FfmpegSession::new(ffmpeg, input_args, output_args);
    let mut controller = RecordingLoopController::new(config, session, TerminalKeys::new(), interrupt);
    let mut reporter = Reporter { json, quiet };
    controller.run(|event| reporter.report(event)).await
}

/// Merge flags over settings and validate the result.
pub fn build_configuration(
    mode: CaptureMode,
    options: &RecordOptions,
    settings: &Settings,
) -> Result<RecordingConfiguration, ValidationError> {
    let stop_key = if options.no_stop_key {
        None
    } else {
        options.stop_key.as_deref().or(settings.keys.stop.as_deref())
    };
    let pause_key = options.pause_key.as_deref().or(settings.keys.pause.as_deref());
    let resume_key = options.resume_key.as_deref().or(settings.keys.resume.as_deref());

    let output = match (&options.output, &settings.output.directory) {
        (Some(output), _) => Some(PathBuf::from(output)),
        (None, Some(dir)) => Some(PathBuf::from(as_directory(dir))),
        (None, None) => None,
    };
    let name_template = options.template.clone().or_else(|| settings.output.template.clone());
    let extension = options
        .format
        .clone()
        .unwrap_or_else(|| mode.default_extension().to_string());

    RecordingOptions {
        duration_secs: options.duration,
        split_secs: options.split,
        max_size_bytes: options.max_size,
        stop_key: parse_optional_key(stop_key)?,
        pause_key: parse_optional_key(pause_key)?,
        resume_key: parse_optional_key(resume_key)?,
        output,
        name_template,
        extension,
        file_prefix: Some(mode.name().to_string()),
        overwrite: options.overwrite || settings.output.overwrite,
    }
    .validate()
}

/// Mark `dir` as a directory so a missing one is created rather than
/// taken as a file name.
fn as_directory(dir: &str) -> String {
    if dir.ends_with(std::path::is_separator) {
        dir.to_string()
    } else {
        format!("{}{}", dir, std::path::MAIN_SEPARATOR)
    }
}

fn parse_optional_key(key: Option<&str>) -> Result<Option<KeySet>, ValidationError> {
    Ok(key.map(parse_key).transpose()?)
}

/// Renders run events: chunk paths on stdout, status on stderr.
struct Reporter {
    json: bool,
    quiet: bool,
}

impl Reporter {
    fn report(&mut self, event: &RecordingEvent) {
        match event {
            RecordingEvent::ChunkStarted { index, path } => {
                if !self.quiet {
                    colors::status_line(&format!(
                        "{} chunk {} {}",
                        colors::recording("Recording"),
                        index,
                        colors::path(&path.display().to_string())
                    ));
                }
            }
            RecordingEvent::Paused => {
                if !self.quiet {
                    colors::status_line(&colors::info("Paused"));
                }
            }
            RecordingEvent::Resumed => {
                if !self.quiet {
                    colors::status_line(&colors::info("Resumed"));
                }
            }
            RecordingEvent::ChunkFinished(record) => {
                if !self.quiet {
                    colors::status_line(&colors::success(&format!(
                        "Saved chunk {} ({})",
                        record.chunk, record.reason
                    )));
                }
                print_record(record, self.json);
            }
        }
    }
}

/// Print one finished chunk to stdout.
fn print_record(record: &ChunkRecord, json: bool) {
    let line = if json {
        match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize chunk record: {}", e);
                return;
            }
        }
    } else {
        record.path.display().to_string()
    };

    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{}", line);
    let _ = stdout.flush();
}

/// Tell the operator which keys control the run.
fn print_hints(config: &RecordingConfiguration) {
    if !std::io::stdin().is_terminal() {
        return;
    }

    let mut hints = Vec::new();
    if !config.stop_keys().is_empty() {
        hints.push(format!("{} to stop", colors::key(&config.stop_keys().to_string())));
    }
    if !config.pause_keys().is_empty() {
        if config.pause_keys() == config.resume_keys() {
            hints.push(format!(
                "{} to pause/resume",
                colors::key(&config.pause_keys().to_string())
            ));
        } else {
            hints.push(format!("{} to pause", colors::key(&config.pause_keys().to_string())));
            hints.push(format!("{} to resume", colors::key(&config.resume_keys().to_string())));
        }
    }
    hints.push(format!("{} to abort", colors::key("Ctrl+C")));

    colors::status_line(&colors::dim(&format!("Press {}.", hints.join(", "))));
}

/// Set the interrupt flag on SIGINT/SIGTERM (Ctrl+C on Windows).
///
/// While raw mode is on, Ctrl+C arrives as a key instead.
fn install_signal_handlers(interrupt: Interrupt) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigint, mut sigterm) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Failed to install signal handlers: {}", e);
                    return;
                }
            };

        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
            interrupt.trigger();
        });
    }

    #[cfg(windows)]
    {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C");
                    interrupt.trigger();
                }
                Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
            }
        });
    }
}

/// Show version information.
pub fn version(json: bool) {
    let version = env!("CARGO_PKG_VERSION");
    if json {
        println!("{}", serde_json::json!({ "version": version }));
    } else {
        println!("{} {}", colors::bold("chunkrec"), version);
    }
}
