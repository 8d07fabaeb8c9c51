//! Segment recorder and its rotation worker
//!
//! The worker owns the recording encoder. It wakes every poll interval and,
//! once the current segment is older than the rotation interval, swaps the
//! encoder onto a fresh segment and then converts the one it just closed.
//!
//! ```text
//!   tick ──► elapsed < interval ──► wait for next tick
//!     │
//!     └──► elapsed >= interval
//!            encoder.stop()            (current segment finalized)
//!            encoder.start(next)       (capture resumes)
//!            converter.convert(prev)   (inline, after re-arming)
//!              ok  → delete raw
//!              err → keep raw, log
//! ```
//!
//! Stop requests are a [`CancellationToken`] raced against the tick, so a
//! stop is observed as soon as the worker is between steps. A rotation or
//! conversion in progress is never interrupted.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::convert::Converter;

use super::config::RecorderConfig;
use super::encoder::RecordingEncoder;
use super::error::RecorderError;
use super::segment::{Segment, SegmentClock, SegmentState};
use super::state::{RecorderState, RecorderStats};

/// Parts held between construction and `start`
struct Pending<E, C> {
    encoder: E,
    converter: C,
    state_tx: watch::Sender<RecorderState>,
}

/// Rotating segment recorder
///
/// Owns a dedicated worker task once started. The encoder and converter are
/// moved into the worker; callers interact through stop signalling and the
/// observable [`RecorderState`].
pub struct SegmentRecorder<E, C> {
    config: RecorderConfig,
    pending: Option<Pending<E, C>>,
    state_rx: watch::Receiver<RecorderState>,
    cancel: CancellationToken,
    stats: Arc<RecorderStats>,
    handle: Option<JoinHandle<Result<(), RecorderError>>>,
}

impl<E: RecordingEncoder, C: Converter> SegmentRecorder<E, C> {
    /// Create an idle recorder
    pub fn new(config: RecorderConfig, encoder: E, converter: C) -> Self {
        let (state_tx, state_rx) = watch::channel(RecorderState::Idle);

        Self {
            config,
            pending: Some(Pending {
                encoder,
                converter,
                state_tx,
            }),
            state_rx,
            cancel: CancellationToken::new(),
            stats: Arc::new(RecorderStats::new()),
            handle: None,
        }
    }

    /// Start recording
    ///
    /// Opens the first segment, starts the encoder on it and launches the
    /// worker task. An encoder failure here leaves the recorder `Failed`.
    pub async fn start(&mut self) -> Result<(), RecorderError> {
        let Some(Pending {
            mut encoder,
            converter,
            state_tx,
        }) = self.pending.take()
        else {
            return Err(RecorderError::AlreadyStarted);
        };

        let opened = async {
            tokio::fs::create_dir_all(&self.config.output_dir).await?;
            let clock = SegmentClock::new();
            let segment = Segment::open(&self.config.output_dir, &clock).await?;
            encoder.start(&segment.raw_path).await?;
            Ok::<_, RecorderError>((clock, segment))
        }
        .await;

        let (clock, segment) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                tracing::error!(error = %e, "Failed to start recording");
                state_tx.send_replace(RecorderState::Failed);
                return Err(e);
            }
        };

        self.stats.record_started();
        state_tx.send_replace(RecorderState::Recording);

        tracing::info!(
            segment = %segment.name(),
            dir = %self.config.output_dir.display(),
            interval_secs = self.config.rotation_interval.as_secs(),
            "Recording started"
        );

        let worker = Worker {
            config: self.config.clone(),
            encoder,
            converter,
            clock,
            current: segment,
            state_tx,
            cancel: self.cancel.clone(),
            stats: Arc::clone(&self.stats),
        };

        self.handle = Some(tokio::spawn(worker.run()));
        Ok(())
    }

    /// Ask the worker to stop
    ///
    /// Returns immediately. The worker stops the encoder (and, if configured,
    /// converts the final segment) before reaching `Stopped`.
    pub fn signal_stop(&self) {
        tracing::debug!("Stop requested");
        self.cancel.cancel();
    }

    /// Wait up to `timeout` for the worker to finish
    ///
    /// Returns the state reached. On timeout the worker is left running and
    /// may still hold the encoder; this is logged and the current state
    /// returned.
    pub async fn await_termination(&mut self, timeout: Duration) -> RecorderState {
        if self.handle.is_none() {
            return self.state();
        }

        let mut rx = self.state_rx.clone();
        let waited = tokio::time::timeout(timeout, async move {
            rx.wait_for(|s| s.is_terminal()).await.map(|s| *s)
        })
        .await;

        match waited {
            Ok(Ok(state)) => {
                if let Some(handle) = self.handle.take() {
                    if let Err(e) = handle.await {
                        tracing::error!(error = %e, "Recorder worker panicked");
                        return RecorderState::Failed;
                    }
                }
                state
            }
            Ok(Err(_)) => {
                // Sender dropped without a terminal state: the worker panicked
                tracing::error!("Recorder worker ended unexpectedly");
                self.handle = None;
                RecorderState::Failed
            }
            Err(_) => {
                let state = self.state();
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    state = %state,
                    "Recorder did not stop in time; encoder may still be held"
                );
                state
            }
        }
    }
}

impl<E, C> SegmentRecorder<E, C> {
    /// Current state
    pub fn state(&self) -> RecorderState {
        *self.state_rx.borrow()
    }

    /// Receiver that observes every state change
    pub fn state_watch(&self) -> watch::Receiver<RecorderState> {
        self.state_rx.clone()
    }

    /// Recorder counters
    pub fn stats(&self) -> &Arc<RecorderStats> {
        &self.stats
    }

    /// Recorder configuration
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }
}

struct Worker<E, C> {
    config: RecorderConfig,
    encoder: E,
    converter: C,
    clock: SegmentClock,
    current: Segment,
    state_tx: watch::Sender<RecorderState>,
    cancel: CancellationToken,
    stats: Arc<RecorderStats>,
}

impl<E: RecordingEncoder, C: Converter> Worker<E, C> {
    async fn run(mut self) -> Result<(), RecorderError> {
        let cancel = self.cancel.clone();
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.current.elapsed() < self.config.rotation_interval {
                continue;
            }

            if let Err(e) = self.rotate().await {
                tracing::error!(
                    error = %e,
                    segment = %self.current.name(),
                    "Encoder failed during rotation; recording stopped"
                );
                self.state_tx.send_replace(RecorderState::Failed);
                return Err(e);
            }
        }

        self.finish().await
    }

    async fn rotate(&mut self) -> Result<(), RecorderError> {
        self.state_tx.send_replace(RecorderState::Rotating);

        self.encoder.stop().await?;
        let next = Segment::open(&self.config.output_dir, &self.clock).await?;
        self.encoder.start(&next.raw_path).await?;
        self.stats.record_started();

        let mut closed = std::mem::replace(&mut self.current, next);
        closed.state = SegmentState::PendingConversion;
        self.state_tx.send_replace(RecorderState::Recording);

        tracing::info!(
            closed = %closed.name(),
            current = %self.current.name(),
            "Segment rotated"
        );

        finalize_segment(&self.converter, &self.stats, &mut closed).await;
        Ok(())
    }

    async fn finish(mut self) -> Result<(), RecorderError> {
        if let Err(e) = self.encoder.stop().await {
            tracing::error!(error = %e, segment = %self.current.name(), "Failed to stop encoder");
            self.state_tx.send_replace(RecorderState::Failed);
            return Err(e.into());
        }
        self.current.state = SegmentState::PendingConversion;

        if self.config.convert_on_stop {
            finalize_segment(&self.converter, &self.stats, &mut self.current).await;
        } else {
            tracing::info!(segment = %self.current.name(), "Final segment left unconverted");
        }

        self.state_tx.send_replace(RecorderState::Stopped);
        tracing::info!(
            segments = self.stats.segments_started(),
            converted = self.stats.segments_converted(),
            failed = self.stats.conversion_failures(),
            "Recording stopped"
        );
        Ok(())
    }
}

/// Convert a closed segment and reclaim its raw file on success
///
/// Conversion failures are recovered here: the raw file stays on disk for
/// manual recovery and recording carries on.
async fn finalize_segment<C: Converter>(converter: &C, stats: &RecorderStats, segment: &mut Segment) {
    let result = match converter.convert(&segment.raw_path).await {
        Ok(container) => match tokio::fs::try_exists(&container).await {
            Ok(true) => Ok(container),
            Ok(false) => Err(format!("container {} missing after conversion", container.display())),
            Err(e) => Err(e.to_string()),
        },
        Err(e) => Err(e.to_string()),
    };

    match result {
        Ok(container) => {
            remove_raw(&segment.raw_path).await;
            segment.state = SegmentState::Converted;
            stats.record_converted();
            tracing::info!(
                segment = %segment.name(),
                container = %container.display(),
                "Segment converted"
            );
        }
        Err(reason) => {
            segment.state = SegmentState::ConversionFailed;
            stats.record_failure();
            tracing::error!(
                segment = %segment.name(),
                error = %reason,
                "Segment conversion failed; raw file kept"
            );
        }
    }
}

async fn remove_raw(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to delete converted raw segment");
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use parking_lot::Mutex;

    use super::*;
    use crate::convert::ConversionError;
    use crate::recorder::encoder::EncoderError;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Start(PathBuf),
        Stop,
    }

    #[derive(Clone, Default)]
    struct MockEncoder {
        calls: Arc<Mutex<Vec<Call>>>,
        fail_on_start: Option<usize>,
    }

    impl MockEncoder {
        fn starts(&self) -> Vec<PathBuf> {
            self.calls
                .lock()
                .iter()
                .filter_map(|c| match c {
                    Call::Start(p) => Some(p.clone()),
                    Call::Stop => None,
                })
                .collect()
        }

        fn stops(&self) -> usize {
            self.calls.lock().iter().filter(|c| **c == Call::Stop).count()
        }
    }

    impl RecordingEncoder for MockEncoder {
        async fn start(&mut self, output: &Path) -> Result<(), EncoderError> {
            let started = self.starts().len();
            if self.fail_on_start == Some(started) {
                return Err(EncoderError::Exited("camera unplugged".into()));
            }
            std::fs::write(output, b"raw h264")?;
            self.calls.lock().push(Call::Start(output.to_path_buf()));
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), EncoderError> {
            self.calls.lock().push(Call::Stop);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct MockConverter {
        fail: bool,
        converted: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl Converter for MockConverter {
        async fn convert(&self, raw: &Path) -> Result<PathBuf, ConversionError> {
            self.converted.lock().push(raw.to_path_buf());
            if self.fail {
                return Err(ConversionError::Failed {
                    path: raw.to_path_buf(),
                    reason: "exit status: 1".into(),
                });
            }
            let out = raw.with_extension("mp4");
            std::fs::copy(raw, &out)?;
            Ok(out)
        }
    }

    fn config(dir: &Path) -> RecorderConfig {
        RecorderConfig::new(dir)
            .rotation_interval(Duration::from_secs(60))
            .poll_interval(Duration::from_secs(1))
    }

    fn files_with_ext(dir: &Path, ext: &str) -> Vec<PathBuf> {
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().map(|e| e == ext).unwrap_or(false))
            .collect();
        files.sort();
        files
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotation_produces_expected_segments() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = MockEncoder::default();
        let mut recorder =
            SegmentRecorder::new(config(dir.path()), encoder.clone(), MockConverter::default());

        recorder.start().await.unwrap();
        assert_eq!(recorder.state(), RecorderState::Recording);

        tokio::time::sleep(Duration::from_secs(185)).await;
        recorder.signal_stop();
        let state = recorder.await_termination(Duration::from_secs(2)).await;
        assert_eq!(state, RecorderState::Stopped);

        // Initial segment plus rotations at 60s, 120s and 180s
        let starts = encoder.starts();
        assert_eq!(starts.len(), 4);
        assert_eq!(encoder.stops(), 4);

        let names: Vec<String> = starts
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.windows(2).all(|w| w[0] < w[1]), "{:?}", names);

        assert_eq!(recorder.stats().segments_started(), 4);
        assert_eq!(recorder.stats().segments_converted(), 4);
        assert_eq!(files_with_ext(dir.path(), "mp4").len(), 4);
        assert!(files_with_ext(dir.path(), "h264").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_conversion_removes_raw() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = MockEncoder::default();
        let mut recorder =
            SegmentRecorder::new(config(dir.path()), encoder.clone(), MockConverter::default());

        recorder.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;

        let starts = encoder.starts();
        assert_eq!(starts.len(), 2);

        // Closed segment converted and reclaimed
        assert!(!starts[0].exists());
        assert!(starts[0].with_extension("mp4").exists());
        // Current segment still recording
        assert!(starts[1].exists());
        assert!(!starts[1].with_extension("mp4").exists());
        assert_eq!(recorder.state(), RecorderState::Recording);

        recorder.signal_stop();
        recorder.await_termination(Duration::from_secs(2)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_conversion_keeps_raw_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = MockEncoder::default();
        let converter = MockConverter {
            fail: true,
            ..Default::default()
        };
        let mut recorder = SegmentRecorder::new(
            config(dir.path()).convert_on_stop(false),
            encoder.clone(),
            converter.clone(),
        );

        recorder.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(125)).await;

        let starts = encoder.starts();
        assert_eq!(starts.len(), 3);
        assert_eq!(converter.converted.lock().len(), 2);
        assert!(starts[0].exists());
        assert!(starts[1].exists());
        assert!(files_with_ext(dir.path(), "mp4").is_empty());
        assert_eq!(recorder.stats().conversion_failures(), 2);
        assert_eq!(recorder.state(), RecorderState::Recording);

        recorder.signal_stop();
        assert_eq!(
            recorder.await_termination(Duration::from_secs(2)).await,
            RecorderState::Stopped
        );
        // Final segment was not handed to the converter
        assert_eq!(converter.converted.lock().len(), 2);
        assert_eq!(files_with_ext(dir.path(), "h264").len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_within_two_poll_intervals() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = MockEncoder::default();
        let config = config(dir.path()).poll_interval(Duration::from_secs(5));
        let mut recorder = SegmentRecorder::new(config, encoder.clone(), MockConverter::default());

        recorder.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(12)).await;

        recorder.signal_stop();
        let state = recorder.await_termination(Duration::from_secs(10)).await;

        assert_eq!(state, RecorderState::Stopped);
        assert_eq!(encoder.stops(), 1);
        assert_eq!(files_with_ext(dir.path(), "mp4").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = MockEncoder {
            fail_on_start: Some(1),
            ..Default::default()
        };
        let mut recorder =
            SegmentRecorder::new(config(dir.path()), encoder.clone(), MockConverter::default());

        recorder.start().await.unwrap();
        let mut watch = recorder.state_watch();
        tokio::time::timeout(Duration::from_secs(90), watch.wait_for(|s| s.is_terminal()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(recorder.state(), RecorderState::Failed);
        assert_eq!(
            recorder.await_termination(Duration::from_secs(1)).await,
            RecorderState::Failed
        );
        // The segment that was recording when the encoder died is kept
        assert_eq!(encoder.starts().len(), 1);
        assert!(encoder.starts()[0].exists());
    }

    #[tokio::test]
    async fn test_start_failure_reports_failed() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = MockEncoder {
            fail_on_start: Some(0),
            ..Default::default()
        };
        let mut recorder = SegmentRecorder::new(config(dir.path()), encoder, MockConverter::default());

        let err = recorder.start().await.unwrap_err();
        assert!(matches!(err, RecorderError::Encoder(_)));
        assert_eq!(recorder.state(), RecorderState::Failed);
    }

    #[tokio::test]
    async fn test_start_twice() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = SegmentRecorder::new(
            config(dir.path()),
            MockEncoder::default(),
            MockConverter::default(),
        );

        assert_eq!(recorder.state(), RecorderState::Idle);
        recorder.start().await.unwrap();
        assert!(matches!(
            recorder.start().await,
            Err(RecorderError::AlreadyStarted)
        ));

        recorder.signal_stop();
        recorder.await_termination(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn test_await_termination_when_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = SegmentRecorder::new(
            config(dir.path()),
            MockEncoder::default(),
            MockConverter::default(),
        );

        assert_eq!(
            recorder.await_termination(Duration::from_millis(10)).await,
            RecorderState::Idle
        );
    }
}
