//! HTTP server
//!
//! A TCP accept loop hands each connection to hyper's HTTP/1 driver on its
//! own task. Requests are dispatched by an axum [`Router`](axum::Router)
//! built in [`routes`].
//!
//! # Architecture
//!
//! ```text
//!  TcpListener ──accept──► HttpServer ──spawn──► hyper http1 connection
//!                              │                        │
//!                     connection limit                  ▼
//!                      (Semaphore)                 axum Router
//!                                                       │
//!                   ┌──────────────┬────────────────────┼─────────────────┐
//!                   ▼              ▼                    ▼                 ▼
//!               pages         /stream.mjpg       /recordings/*     /playback.html
//!                             FrameSubscriber    RecordingStore
//! ```

pub mod config;
pub mod error;
pub mod listener;
pub mod pages;
pub mod recordings;
pub mod routes;
pub mod state;
pub mod stream;

pub use config::ServerConfig;
pub use error::HttpError;
pub use listener::HttpServer;
pub use pages::Pages;
pub use routes::router;
pub use state::AppState;

use axum::http::header::{HeaderName, AGE, CACHE_CONTROL, PRAGMA};

/// Headers that keep browsers and proxies from caching a response
pub const NO_CACHE_HEADERS: [(HeaderName, &str); 3] = [
    (AGE, "0"),
    (CACHE_CONTROL, "no-cache, private"),
    (PRAGMA, "no-cache"),
];
