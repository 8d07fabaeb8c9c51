//! Single-slot frame broadcaster for live viewers
//!
//! The capture side publishes every encoded frame into one [`FrameMailbox`].
//! Each live-stream connection holds a [`FrameSubscriber`] and awaits the next
//! frame. The mailbox keeps only the latest frame, so a slow viewer skips
//! intermediate frames instead of queueing them.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<FrameMailbox>
//!                     ┌─────────────────────────┐
//!                     │ slot: Mutex<Slot {      │
//!                     │   generation: u64,      │
//!                     │   frame: Option<Frame>, │
//!                     │ }>                      │
//!                     │ notify: Notify          │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Capture]              [Subscriber]            [Subscriber]
//!    publish()              next_frame()            next_frame()
//!         │                       │                       │
//!         └──► generation += 1 ──► notify_waiters() ──► HTTP body
//! ```
//!
//! # Zero-Copy Design
//!
//! `bytes::Bytes` uses reference counting, so every subscriber shares the
//! allocation made by the producer. Handing a frame to a viewer is a
//! reference-count bump.

pub mod frame;
pub mod mailbox;

pub use frame::Frame;
pub use mailbox::{FrameMailbox, FrameSubscriber};
