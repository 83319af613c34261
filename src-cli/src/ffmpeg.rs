//! Capture session backed by an ffmpeg child process.
//!
//! One ffmpeg process records one chunk. The process reads the platform
//! capture device and writes straight to the chunk path; it is stopped
//! gracefully by sending `q` on stdin, which lets it finalize the container.

use async_trait::async_trait;
use chunkrec_common::completion::completion;
use chunkrec_common::{CaptureError, CaptureSession};
use ffmpeg_sidecar::command::FfmpegCommand;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// ffmpeg prints this once input and output are open.
const READY_MARKER: &str = "Press [q]";

/// How long ffmpeg may take to open the capture device.
const START_TIMEOUT: Duration = Duration::from_secs(10);

/// How long ffmpeg may take to finalize after `q` before it is killed.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of stderr lines kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Find the ffmpeg binary.
///
/// An explicit path (from `--ffmpeg` or settings) may be a file path or a
/// name to look up on PATH. Otherwise `ffmpeg` is looked up on PATH, then
/// next to the current executable.
pub fn locate_ffmpeg(explicit: Option<&str>) -> Result<PathBuf, CaptureError> {
    if let Some(explicit) = explicit {
        let expanded = PathBuf::from(shellexpand::tilde(explicit).as_ref());
        if expanded.is_file() {
            return Ok(expanded);
        }
        return which::which(&expanded).map_err(|_| {
            CaptureError::Unavailable(format!("ffmpeg not found at {}", expanded.display()))
        });
    }

    if let Ok(path) = which::which("ffmpeg") {
        return Ok(path);
    }

    let sidecar = ffmpeg_sidecar::paths::ffmpeg_path();
    if sidecar.is_file() {
        return Ok(sidecar);
    }

    Err(CaptureError::Unavailable(
        "ffmpeg not found on PATH (install it or pass --ffmpeg)".to_string(),
    ))
}

/// A running ffmpeg process writing one chunk.
struct Process {
    child: Child,
    stdin: Option<ChildStdin>,
    path: PathBuf,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    exited: oneshot::Receiver<()>,
    paused: bool,
}

impl Process {
    fn tail(&self) -> String {
        summarize(&self.stderr_tail.lock())
    }

    fn kill(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!("Failed to kill ffmpeg: {}", e);
        }
    }

    #[cfg(unix)]
    fn signal(&self, signal: libc::c_int) -> Result<(), CaptureError> {
        let pid = self.child.id() as libc::pid_t;
        let result = unsafe { libc::kill(pid, signal) };
        if result != 0 {
            return Err(CaptureError::Io(std::io::Error::last_os_error()));
        }
        Ok(())
    }
}

/// Wait for `child` to exit on the blocking pool.
async fn reap(mut child: Child) -> Result<ExitStatus, CaptureError> {
    let status = tokio::task::spawn_blocking(move || child.wait())
        .await
        .map_err(|e| CaptureError::Failed(e.to_string()))??;
    Ok(status)
}

/// ffmpeg-backed [`CaptureSession`].
pub struct FfmpegSession {
    ffmpeg: PathBuf,
    input_args: Vec<String>,
    output_args: Vec<String>,
    start_timeout: Duration,
    stop_timeout: Duration,
    process: Option<Process>,
    #[cfg_attr(unix, allow(dead_code))]
    warned_pause: bool,
}

impl FfmpegSession {
    pub fn new(ffmpeg: PathBuf, input_args: Vec<String>, output_args: Vec<String>) -> Self {
        Self {
            ffmpeg,
            input_args,
            output_args,
            start_timeout: START_TIMEOUT,
            stop_timeout: STOP_TIMEOUT,
            process: None,
            warned_pause: false,
        }
    }

    /// Override how long ffmpeg may take to open its input and to finalize.
    pub fn with_timeouts(mut self, start: Duration, stop: Duration) -> Self {
        self.start_timeout = start;
        self.stop_timeout = stop;
        self
    }

    /// Spawn ffmpeg writing to `path`.
    ///
    /// The receiver resolves with `true` once ffmpeg reports it is running,
    /// or `false` if it exits first.
    fn spawn(&self, path: &Path) -> Result<(Process, oneshot::Receiver<bool>), CaptureError> {
        let mut command = FfmpegCommand::new_with_path(&self.ffmpeg);
        command
            .args(["-hide_banner", "-nostats"])
            .args(&self.input_args)
            .args(&self.output_args)
            .args(["-y"]) // Existing files were already handled by the path resolver
            .arg(path.to_string_lossy().to_string());

        let inner_command = command.as_inner_mut();
        inner_command.stdin(Stdio::piped());
        inner_command.stdout(Stdio::null());
        inner_command.stderr(Stdio::piped());

        let mut child = inner_command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                CaptureError::Unavailable(format!(
                    "cannot run ffmpeg at {}: {}",
                    self.ffmpeg.display(),
                    e
                ))
            }
            _ => CaptureError::Io(e),
        })?;

        let stdin = child.stdin.take();
        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let (ready, ready_rx) = completion::<bool>();
        let (exited, exited_rx) = completion::<()>();

        match child.stderr.take() {
            Some(stderr) => {
                let tail = stderr_tail.clone();
                std::thread::spawn(move || {
                    let reader = BufReader::new(stderr);
                    for line in reader.lines().map_while(Result::ok) {
                        debug!(target: "ffmpeg", "{}", line);
                        if line.contains(READY_MARKER) {
                            ready.complete(true);
                        }
                        let mut tail = tail.lock();
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                    // stderr closes when ffmpeg exits
                    ready.complete(false);
                    exited.complete(());
                });
            }
            None => {
                ready.complete(false);
                exited.complete(());
            }
        }

        let process = Process {
            child,
            stdin,
            path: path.to_path_buf(),
            stderr_tail,
            exited: exited_rx,
            paused: false,
        };
        Ok((process, ready_rx))
    }
}

#[async_trait]
impl CaptureSession for FfmpegSession {
    async fn start(&mut self, path: &Path) -> Result<(), CaptureError> {
        if self.process.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        debug!(ffmpeg = %self.ffmpeg.display(), args = ?self.input_args, "Starting ffmpeg");
        let (mut process, ready) = self.spawn(path)?;

        match tokio::time::timeout(self.start_timeout, ready).await {
            Ok(Ok(true)) => {
                info!(pid = process.child.id(), path = %path.display(), "ffmpeg recording");
                self.process = Some(process);
                Ok(())
            }
            Ok(_) => {
                let tail = process.tail();
                if let Err(e) = reap(process.child).await {
                    debug!("Failed to reap ffmpeg: {}", e);
                }
                Err(CaptureError::StartFailed(tail))
            }
            Err(_) => {
                process.kill();
                let tail = process.tail();
                if let Err(e) = reap(process.child).await {
                    debug!("Failed to reap ffmpeg: {}", e);
                }
                Err(CaptureError::StartFailed(format!(
                    "ffmpeg did not start within {:?}: {}",
                    self.start_timeout, tail
                )))
            }
        }
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };

        // Already exited; check_health reported it
        if let Ok(Some(status)) = process.child.try_wait() {
            debug!("ffmpeg already exited with {}", status);
            return Ok(());
        }

        #[cfg(unix)]
        if process.paused {
            process.signal(libc::SIGCONT)?;
        }

        if let Some(mut stdin) = process.stdin.take() {
            if let Err(e) = stdin.write_all(b"q").and_then(|_| stdin.flush()) {
                debug!("Failed to send quit to ffmpeg: {}", e);
            }
        }

        let finished = tokio::time::timeout(self.stop_timeout, &mut process.exited)
            .await
            .is_ok();
        if !finished {
            warn!("ffmpeg did not exit within {:?}, killing it", self.stop_timeout);
            process.kill();
            if let Err(e) = reap(process.child).await {
                debug!("Failed to reap ffmpeg: {}", e);
            }
            return Err(CaptureError::Failed(format!(
                "ffmpeg did not finalize {}",
                process.path.display()
            )));
        }

        let status = reap(process.child).await?;

        if !status.success() {
            let tail = summarize(&process.stderr_tail.lock());
            return Err(CaptureError::Failed(format!(
                "ffmpeg exited with {}: {}",
                status, tail
            )));
        }

        debug!(path = %process.path.display(), "ffmpeg finalized output");
        Ok(())
    }

    fn current_output_size_bytes(&self) -> Option<u64> {
        let process = self.process.as_ref()?;
        std::fs::metadata(&process.path).ok().map(|m| m.len())
    }

    async fn pause(&mut self) -> Result<(), CaptureError> {
        #[cfg(unix)]
        if let Some(process) = self.process.as_mut() {
            process.signal(libc::SIGSTOP)?;
            process.paused = true;
        }

        #[cfg(not(unix))]
        if !self.warned_pause {
            warn!("Suspending ffmpeg is not supported on this platform; pause only delays splitting");
            self.warned_pause = true;
        }

        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        #[cfg(unix)]
        if let Some(process) = self.process.as_mut() {
            if process.paused {
                process.signal(libc::SIGCONT)?;
                process.paused = false;
            }
        }

        Ok(())
    }

    fn check_health(&mut self) -> Result<(), CaptureError> {
        let Some(process) = self.process.as_mut() else {
            return Ok(());
        };
        match process.child.try_wait()? {
            Some(status) => Err(CaptureError::Exited(format!(
                "ffmpeg exited with {}: {}",
                status,
                process.tail()
            ))),
            None => Ok(()),
        }
    }
}

impl Drop for FfmpegSession {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            warn!("Killing ffmpeg still recording {}", process.path.display());
            #[cfg(unix)]
            if process.paused {
                let _ = process.signal(libc::SIGCONT);
            }
            process.kill();
            let _ = process.child.wait();
        }
    }
}

/// Join the last few meaningful stderr lines into one message.
fn summarize(lines: &VecDeque<String>) -> String {
    let meaningful: Vec<&str> = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.contains(READY_MARKER))
        .collect();
    if meaningful.is_empty() {
        return "no output from ffmpeg".to_string();
    }
    let start = meaningful.len().saturating_sub(3);
    meaningful[start..].join("; ")
}
