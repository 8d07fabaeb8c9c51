//! H.264 recording encoder
//!
//! Implements [`RecordingEncoder`] with one ffmpeg process per segment. A
//! feeder task subscribes to the frame mailbox and writes each JPEG into
//! ffmpeg's stdin; ffmpeg writes a raw H.264 elementary stream to the
//! segment file.
//!
//! ```text
//! FrameMailbox ──► feeder task ──► ffmpeg stdin ──► <segment>.h264
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broadcast::{FrameMailbox, FrameSubscriber};
use crate::recorder::{EncoderError, RecordingEncoder};

struct Running {
    child: Child,
    output: PathBuf,
    cancel: CancellationToken,
    feeder: JoinHandle<u64>,
}

/// Segment encoder backed by ffmpeg/libx264
pub struct H264Encoder {
    mailbox: Arc<FrameMailbox>,
    ffmpeg: PathBuf,
    framerate: u32,
    flush_timeout: Duration,
    running: Option<Running>,
}

impl H264Encoder {
    /// Create an encoder reading frames from `mailbox`
    pub fn new(mailbox: Arc<FrameMailbox>) -> Self {
        Self {
            mailbox,
            ffmpeg: PathBuf::from("ffmpeg"),
            framerate: 24,
            flush_timeout: Duration::from_secs(5),
            running: None,
        }
    }

    /// Set the ffmpeg executable
    pub fn program(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self
    }

    /// Set the input frame rate
    pub fn framerate(mut self, fps: u32) -> Self {
        self.framerate = fps.max(1);
        self
    }

    /// How long `stop` waits for ffmpeg to finish writing
    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Whether a segment is being encoded
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// ffmpeg arguments for encoding into `output`
    pub fn args(&self, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(24);
        for a in ["-hide_banner", "-loglevel", "error", "-f", "mjpeg", "-framerate"] {
            args.push(a.into());
        }
        args.push(self.framerate.to_string().into());
        for a in [
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-preset",
            "ultrafast",
            "-tune",
            "zerolatency",
            "-pix_fmt",
            "yuv420p",
            "-f",
            "h264",
            "-y",
        ] {
            args.push(a.into());
        }
        args.push(output.as_os_str().to_owned());
        args
    }
}

impl RecordingEncoder for H264Encoder {
    async fn start(&mut self, output: &Path) -> Result<(), EncoderError> {
        if self.running.is_some() {
            return Err(EncoderError::AlreadyRunning);
        }

        let mut child = Command::new(&self.ffmpeg)
            .args(self.args(output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(EncoderError::Launch)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EncoderError::Exited("encoder stdin unavailable".into()))?;

        let cancel = CancellationToken::new();
        let feeder = tokio::spawn(feed(self.mailbox.subscribe(), stdin, cancel.clone()));

        tracing::debug!(output = %output.display(), pid = child.id(), "Encoder started");

        self.running = Some(Running {
            child,
            output: output.to_path_buf(),
            cancel,
            feeder,
        });
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EncoderError> {
        let Some(mut running) = self.running.take() else {
            return Ok(());
        };

        // Ending the feeder drops stdin, which is ffmpeg's end of input
        running.cancel.cancel();
        let frames = running.feeder.await.unwrap_or(0);

        let status = match tokio::time::timeout(self.flush_timeout, running.child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                tracing::warn!(
                    output = %running.output.display(),
                    timeout_ms = self.flush_timeout.as_millis() as u64,
                    "Encoder did not flush in time; killing"
                );
                running.child.kill().await?;
                return Err(EncoderError::Exited("encoder killed after flush timeout".into()));
            }
        };

        if !status.success() {
            return Err(EncoderError::Exited(format!(
                "encoder for {} exited: {}",
                running.output.display(),
                status
            )));
        }

        tracing::debug!(output = %running.output.display(), frames = frames, "Encoder stopped");
        Ok(())
    }
}

/// Copy frames into ffmpeg until cancelled, the mailbox closes, or the pipe breaks
async fn feed(mut subscriber: FrameSubscriber, mut stdin: ChildStdin, cancel: CancellationToken) -> u64 {
    let mut written = 0u64;

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = subscriber.next_frame() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        if let Err(e) = stdin.write_all(&frame.data).await {
            tracing::warn!(error = %e, written = written, "Encoder input closed");
            break;
        }
        written += 1;
    }

    if let Err(e) = stdin.shutdown().await {
        tracing::debug!(error = %e, "Encoder stdin shutdown failed");
    }
    written
}
