//! Live MJPEG capture
//!
//! Runs ffmpeg against the capture device, splits its MJPEG stdout into JPEG
//! frames and publishes each one to the frame mailbox.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broadcast::FrameMailbox;
use crate::recorder::EncoderError;

use super::mjpeg::JpegSplitter;

const READ_CHUNK_SIZE: usize = 32 * 1024;

/// Capture device configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// ffmpeg executable
    pub ffmpeg: PathBuf,

    /// ffmpeg input format (`-f`), e.g. `v4l2`
    pub input_format: String,

    /// Capture device or input URL
    pub device: String,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Frames per second
    pub framerate: u32,

    /// JPEG quality for live frames (2 = best, 31 = worst)
    pub quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            input_format: "v4l2".into(),
            device: "/dev/video0".into(),
            width: 640,
            height: 480,
            framerate: 24,
            quality: 5,
        }
    }
}

impl CaptureConfig {
    /// Set the capture device
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    /// Set the frame size
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the frame rate
    pub fn framerate(mut self, fps: u32) -> Self {
        self.framerate = fps.max(1);
        self
    }

    /// Set the JPEG quality, clamped to ffmpeg's 2..=31 scale
    pub fn quality(mut self, q: u8) -> Self {
        self.quality = q.clamp(2, 31);
        self
    }

    /// ffmpeg arguments for this capture
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-f"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(self.input_format.clone().into());
        args.push("-framerate".into());
        args.push(self.framerate.to_string().into());
        args.push("-video_size".into());
        args.push(format!("{}x{}", self.width, self.height).into());
        args.push("-i".into());
        args.push(self.device.clone().into());
        for a in ["-an", "-c:v", "mjpeg", "-q:v"] {
            args.push(a.into());
        }
        args.push(self.quality.to_string().into());
        for a in ["-f", "mjpeg", "pipe:1"] {
            args.push(a.into());
        }
        args
    }
}

/// Running capture process feeding a [`FrameMailbox`]
pub struct MjpegCapture {
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<(), EncoderError>>>,
}

impl MjpegCapture {
    /// Launch the capture process
    pub fn spawn(config: &CaptureConfig, mailbox: Arc<FrameMailbox>) -> Result<Self, EncoderError> {
        let mut child = Command::new(&config.ffmpeg)
            .args(config.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(EncoderError::Launch)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EncoderError::Exited("capture stdout unavailable".into()))?;

        tracing::info!(
            device = %config.device,
            format = %config.input_format,
            width = config.width,
            height = config.height,
            fps = config.framerate,
            pid = child.id(),
            "Capture started"
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_capture(child, stdout, mailbox, cancel.clone()));

        Ok(Self {
            cancel,
            task: Some(task),
        })
    }

    /// Resolve when the capture ends
    ///
    /// An end not requested through [`stop`](Self::stop) is an error: the
    /// camera is gone. Cancel safe.
    pub async fn wait(&mut self) -> Result<(), EncoderError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let result = task.await;
        self.task = None;
        flatten(result)
    }

    /// Kill the capture process and wait up to `timeout` for it to exit
    pub async fn stop(&mut self, timeout: Duration) -> Result<(), EncoderError> {
        self.cancel.cancel();
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, task).await {
            Ok(result) => flatten(result),
            Err(_) => {
                tracing::warn!("Capture did not exit in time");
                Ok(())
            }
        }
    }
}

fn flatten(result: Result<Result<(), EncoderError>, tokio::task::JoinError>) -> Result<(), EncoderError> {
    match result {
        Ok(r) => r,
        Err(e) => Err(EncoderError::Exited(format!("capture task failed: {}", e))),
    }
}

async fn run_capture<R>(
    mut child: Child,
    stdout: R,
    mailbox: Arc<FrameMailbox>,
    cancel: CancellationToken,
) -> Result<(), EncoderError>
where
    R: AsyncRead + Unpin,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "Failed to kill capture process");
            }
            tracing::info!("Capture stopped");
            Ok(())
        }
        read = publish_frames(stdout, &mailbox) => {
            let frames = read?;
            let status = child.wait().await?;
            tracing::error!(frames = frames, status = %status, "Capture ended unexpectedly");
            Err(exited(status))
        }
    }
}

fn exited(status: ExitStatus) -> EncoderError {
    EncoderError::Exited(format!("capture process exited: {}", status))
}

/// Read MJPEG from `reader` until EOF, publishing each frame
///
/// Returns the number of frames published.
pub async fn publish_frames<R>(mut reader: R, mailbox: &FrameMailbox) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut splitter = JpegSplitter::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    let mut frames = 0u64;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(frames);
        }

        splitter.push(&chunk[..n]);
        while let Some(frame) = splitter.next_frame() {
            let generation = mailbox.publish(frame);
            frames += 1;
            if frames == 1 {
                tracing::debug!(generation = generation, "First frame published");
            }
        }
    }
}
