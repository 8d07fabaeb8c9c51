//! # picam-rs
//!
//! A network camera server: live MJPEG viewing over HTTP plus continuous
//! recording into fixed-length segments that are converted to MP4 for
//! playback in the browser.
//!
//! # Architecture
//!
//! ```text
//!                       ┌──────────────┐
//!   camera ──ffmpeg──►  │ MjpegCapture │
//!                       └──────┬───────┘
//!                              │ publish()
//!                              ▼
//!                      ┌───────────────┐   next_frame()   ┌──────────────┐
//!                      │ FrameMailbox  │ ───────────────► │  HttpServer  │ ──► /stream.mjpg
//!                      └───────┬───────┘                  └──────┬───────┘
//!                              │                                 │
//!                              ▼                                 ▼
//!                      ┌───────────────┐                 ┌───────────────┐
//!                      │ H264Encoder   │                 │RecordingStore │ ──► /recordings/*
//!                      └───────┬───────┘                 └───────▲───────┘
//!                              │ segment.h264                    │ segment.mp4
//!                      ┌───────▼─────────┐  convert()   ┌────────┴───────┐
//!                      │ SegmentRecorder │ ───────────► │ FfmpegConverter│
//!                      └─────────────────┘              └────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use picam_rs::config::CamConfig;
//! use picam_rs::context::CameraContext;
//! use picam_rs::server::HttpServer;
//!
//! let config = CamConfig::load_optional("picam.toml".as_ref())?.unwrap_or_default();
//! let context = CameraContext::start(&config).await?;
//! let server = HttpServer::new(config.server(), context.app_state());
//! server.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! context.shutdown(config.shutdown_timeout()).await;
//! ```

pub mod broadcast;
pub mod camera;
pub mod config;
pub mod context;
pub mod convert;
pub mod error;
pub mod logging;
pub mod recorder;
pub mod server;
pub mod store;

pub use broadcast::{Frame, FrameMailbox, FrameSubscriber};
pub use config::CamConfig;
pub use context::CameraContext;
pub use convert::{Converter, FfmpegConverter};
pub use error::{Error, Result};
pub use recorder::{RecorderConfig, RecorderState, RecordingEncoder, SegmentRecorder};
pub use server::{HttpServer, ServerConfig};
pub use store::{RecordingName, RecordingStore};
