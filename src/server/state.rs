//! Shared handler state

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::broadcast::FrameMailbox;
use crate::store::RecordingStore;

use super::pages::Pages;

/// State shared by every request handler
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live frames
    pub mailbox: Arc<FrameMailbox>,
    /// Recordings directory
    pub store: RecordingStore,
    /// Rendered templates
    pub pages: Arc<Pages>,
    /// Open live-stream responses
    ///
    /// Counted apart from mailbox subscribers, which include the recorder.
    live_viewers: Arc<AtomicU32>,
}

impl AppState {
    pub fn new(mailbox: Arc<FrameMailbox>, store: RecordingStore, pages: Pages) -> Self {
        Self {
            mailbox,
            store,
            pages: Arc::new(pages),
            live_viewers: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Number of live-stream responses currently open
    pub fn live_viewers(&self) -> u32 {
        self.live_viewers.load(Ordering::Relaxed)
    }

    /// Count a viewer until the returned guard drops
    pub(super) fn add_viewer(&self) -> ViewerGuard {
        let count = self.live_viewers.fetch_add(1, Ordering::Relaxed) + 1;
        ViewerGuard {
            viewers: Arc::clone(&self.live_viewers),
            count,
        }
    }
}

/// Holds one slot in the live viewer count
#[derive(Debug)]
pub(super) struct ViewerGuard {
    viewers: Arc<AtomicU32>,
    count: u32,
}

impl ViewerGuard {
    /// Viewer count right after this viewer was added
    pub(super) fn count(&self) -> u32 {
        self.count
    }
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        self.viewers.fetch_sub(1, Ordering::Relaxed);
    }
}
