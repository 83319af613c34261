//! Platform detection and per-platform capture inputs.
//!
//! Each capture mode maps to an ffmpeg input device: PulseAudio, x11grab and
//! v4l2 on Linux, AVFoundation on macOS, dshow and gdigrab on Windows.

use chunkrec_common::{RecordError, ValidationError};
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
use chunkrec_common::CaptureError;

/// Frame rate used when `--fps` is not given.
pub const DEFAULT_FPS: u32 = 30;

/// What is being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Audio,
    Screen { fps: u32 },
    Camera { fps: u32 },
}

impl CaptureMode {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureMode::Audio => "audio",
            CaptureMode::Screen { .. } => "screen",
            CaptureMode::Camera { .. } => "camera",
        }
    }

    /// Extension used when `--format` is not given.
    pub fn default_extension(&self) -> &'static str {
        match self {
            CaptureMode::Audio => "m4a",
            CaptureMode::Screen { .. } | CaptureMode::Camera { .. } => "mp4",
        }
    }

    pub fn is_video(&self) -> bool {
        !matches!(self, CaptureMode::Audio)
    }
}

/// ffmpeg arguments that open the input for `mode`.
///
/// `device` overrides the platform default device. Modes without a usable
/// default on this platform require one.
pub fn input_args(mode: CaptureMode, device: Option<&str>) -> Result<Vec<String>, RecordError> {
    if let CaptureMode::Screen { fps: 0 } | CaptureMode::Camera { fps: 0 } = mode {
        return Err(ValidationError::NotPositive {
            name: "frame rate",
            value: 0.0,
        }
        .into());
    }
    platform_input(mode, device)
}

#[cfg(target_os = "linux")]
fn platform_input(mode: CaptureMode, device: Option<&str>) -> Result<Vec<String>, RecordError> {
    Ok(match mode {
        CaptureMode::Audio => strings(&["-f", "pulse", "-i", device.unwrap_or("default")]),
        CaptureMode::Screen { fps } => {
            let display = match device {
                Some(d) => d.to_string(),
                None => std::env::var("DISPLAY").unwrap_or_else(|_| ":0.0".to_string()),
            };
            let fps = fps.to_string();
            strings(&["-f", "x11grab", "-framerate", &fps, "-i", &display])
        }
        CaptureMode::Camera { fps } => {
            let fps = fps.to_string();
            strings(&[
                "-f",
                "v4l2",
                "-framerate",
                &fps,
                "-i",
                device.unwrap_or("/dev/video0"),
            ])
        }
    })
}

#[cfg(target_os = "macos")]
fn platform_input(mode: CaptureMode, device: Option<&str>) -> Result<Vec<String>, RecordError> {
    Ok(match mode {
        CaptureMode::Audio => {
            let input = format!(":{}", device.unwrap_or("default"));
            strings(&["-f", "avfoundation", "-i", &input])
        }
        CaptureMode::Screen { fps } => {
            let input = format!("{}:none", device.unwrap_or("Capture screen 0"));
            let fps = fps.to_string();
            strings(&[
                "-f",
                "avfoundation",
                "-capture_cursor",
                "1",
                "-framerate",
                &fps,
                "-i",
                &input,
            ])
        }
        CaptureMode::Camera { fps } => {
            let input = format!("{}:none", device.unwrap_or("default"));
            let fps = fps.to_string();
            strings(&["-f", "avfoundation", "-framerate", &fps, "-i", &input])
        }
    })
}

#[cfg(target_os = "windows")]
fn platform_input(mode: CaptureMode, device: Option<&str>) -> Result<Vec<String>, RecordError> {
    let require_device = |kind: &str| {
        device.ok_or_else(|| {
            RecordError::from(ValidationError::Conflict(format!(
                "{} capture on Windows needs --device (a DirectShow device name)",
                kind
            )))
        })
    };

    Ok(match mode {
        CaptureMode::Audio => {
            let input = format!("audio={}", require_device("audio")?);
            strings(&["-f", "dshow", "-i", &input])
        }
        CaptureMode::Screen { fps } => {
            let fps = fps.to_string();
            strings(&["-f", "gdigrab", "-framerate", &fps, "-i", device.unwrap_or("desktop")])
        }
        CaptureMode::Camera { fps } => {
            let input = format!("video={}", require_device("camera")?);
            let fps = fps.to_string();
            strings(&["-f", "dshow", "-framerate", &fps, "-i", &input])
        }
    })
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn platform_input(mode: CaptureMode, _device: Option<&str>) -> Result<Vec<String>, RecordError> {
    Err(CaptureError::Unavailable(format!(
        "{} capture is not supported on this platform",
        mode.name()
    ))
    .into())
}

/// ffmpeg arguments placed before the output path.
pub fn output_args(mode: CaptureMode, extension: &str) -> Vec<String> {
    let mut args = Vec::new();
    if mode.is_video() {
        // Compatible pixel format
        args.extend(strings(&["-pix_fmt", "yuv420p"]));
    }
    if matches!(extension.to_ascii_lowercase().as_str(), "mp4" | "mov" | "m4a") {
        args.extend(strings(&["-movflags", "+faststart"]));
    }
    args
}

/// Check if the session is Wayland, where x11grab only sees XWayland windows.
pub fn is_wayland_session() -> bool {
    #[cfg(target_os = "linux")]
    {
        std::env::var("WAYLAND_DISPLAY").is_ok()
            || std::env::var("XDG_SESSION_TYPE")
                .map(|t| t == "wayland")
                .unwrap_or(false)
    }

    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

/// Get the name of the current desktop environment (for messages).
pub fn desktop_name() -> Option<String> {
    std::env::var("XDG_CURRENT_DESKTOP").ok()
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
