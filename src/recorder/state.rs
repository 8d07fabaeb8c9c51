//! Recorder state machine and counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Recorder lifecycle state
///
/// ```text
/// Idle ──start──► Recording ──interval──► Rotating ──► Recording ... ──stop──► Stopped
///                      │                     │
///                      └──── encoder error ──┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Constructed, not started
    Idle,
    /// Encoder writing into the current segment
    Recording,
    /// Swapping the encoder onto the next segment
    Rotating,
    /// Stopped on request; encoder released
    Stopped,
    /// Stopped by an unrecoverable encoder error
    Failed,
}

impl RecorderState {
    /// Whether the worker has ended
    pub fn is_terminal(self) -> bool {
        matches!(self, RecorderState::Stopped | RecorderState::Failed)
    }
}

impl std::fmt::Display for RecorderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecorderState::Idle => "idle",
            RecorderState::Recording => "recording",
            RecorderState::Rotating => "rotating",
            RecorderState::Stopped => "stopped",
            RecorderState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Running totals for a recorder
#[derive(Debug, Default)]
pub struct RecorderStats {
    segments_started: AtomicU64,
    segments_converted: AtomicU64,
    conversion_failures: AtomicU64,
}

impl RecorderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments the encoder has been started on
    pub fn segments_started(&self) -> u64 {
        self.segments_started.load(Ordering::Relaxed)
    }

    /// Segments converted and removed
    pub fn segments_converted(&self) -> u64 {
        self.segments_converted.load(Ordering::Relaxed)
    }

    /// Segments left raw because conversion failed
    pub fn conversion_failures(&self) -> u64 {
        self.conversion_failures.load(Ordering::Relaxed)
    }

    pub(super) fn record_started(&self) {
        self.segments_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_converted(&self) {
        self.segments_converted.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_failure(&self) {
        self.conversion_failures.fetch_add(1, Ordering::Relaxed);
    }
}
