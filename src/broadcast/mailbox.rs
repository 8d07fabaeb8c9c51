//! Write-one/read-many mailbox holding the most recent frame
//!
//! A publish bumps the slot generation and wakes every waiting subscriber.
//! Each subscriber remembers the last generation it returned and waits while
//! the slot generation is unchanged, so waits are edge-triggered on "a new
//! publish happened" and a subscriber never sees the same frame twice.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::frame::Frame;

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    frame: Option<Frame>,
    closed: bool,
}

/// Single-slot broadcaster of the latest encoded frame
#[derive(Debug, Default)]
pub struct FrameMailbox {
    slot: Mutex<Slot>,
    notify: Notify,
    subscriber_count: AtomicU32,
}

impl FrameMailbox {
    /// Create an empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held frame and wake every waiting subscriber
    ///
    /// Never blocks on readers: the lock is held only to swap the payload.
    /// Returns the generation assigned to the frame. Publishing into a closed
    /// mailbox is ignored and returns the current generation.
    pub fn publish(&self, data: impl Into<Bytes>) -> u64 {
        let generation = {
            let mut slot = self.slot.lock();
            if slot.closed {
                return slot.generation;
            }
            slot.generation += 1;
            slot.frame = Some(Frame::new(slot.generation, data.into()));
            slot.generation
        };

        self.notify.notify_waiters();
        generation
    }

    /// Subscribe to future publishes
    ///
    /// The first [`FrameSubscriber::next_frame`] call waits for a publish
    /// that happens after this call.
    pub fn subscribe(self: &Arc<Self>) -> FrameSubscriber {
        let last_seen = self.slot.lock().generation;
        let count = self.subscriber_count.fetch_add(1, Ordering::Relaxed) + 1;

        tracing::debug!(subscribers = count, generation = last_seen, "Subscriber added");

        FrameSubscriber {
            mailbox: Arc::clone(self),
            last_seen,
        }
    }

    /// Close the mailbox, releasing every waiting subscriber
    pub fn close(&self) {
        self.slot.lock().closed = true;
        self.notify.notify_waiters();
        tracing::debug!("Frame mailbox closed");
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    /// Snapshot of the latest frame, if any was published
    pub fn latest(&self) -> Option<Frame> {
        self.slot.lock().frame.clone()
    }

    /// Number of publishes so far
    pub fn generation(&self) -> u64 {
        self.slot.lock().generation
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> u32 {
        self.subscriber_count.load(Ordering::Relaxed)
    }
}

/// A consumer handle on a [`FrameMailbox`]
#[derive(Debug)]
pub struct FrameSubscriber {
    mailbox: Arc<FrameMailbox>,
    last_seen: u64,
}

impl FrameSubscriber {
    /// Wait for a frame newer than the last one returned
    ///
    /// If several publishes happened since the previous call, only the latest
    /// frame is returned. Once the mailbox is closed and the final frame has
    /// been returned, yields `None`.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            // Register interest before checking the slot so a publish that
            // lands between the check and the await still wakes us.
            let notified = self.mailbox.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let slot = self.mailbox.slot.lock();
                if slot.generation != self.last_seen {
                    if let Some(frame) = &slot.frame {
                        self.last_seen = slot.generation;
                        return Some(frame.clone());
                    }
                }
                if slot.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Generation of the last frame returned to this subscriber
    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    /// The mailbox this subscriber reads from
    pub fn mailbox(&self) -> &Arc<FrameMailbox> {
        &self.mailbox
    }
}

impl Drop for FrameSubscriber {
    fn drop(&mut self) {
        let prev = self.mailbox.subscriber_count.fetch_sub(1, Ordering::Relaxed);
        tracing::debug!(subscribers = prev.saturating_sub(1), "Subscriber removed");
    }
}
