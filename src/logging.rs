//! Tracing subscriber setup
//!
//! Console output is filtered by `RUST_LOG` (default `picam_rs=info`, or
//! `picam_rs=debug` when verbose). Two optional files are written without
//! ANSI colours: an info log receiving INFO and above, and an error log
//! receiving ERROR only. Both files take events from this crate only.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::error::Result;

/// Log destinations
#[derive(Debug, Clone, Default)]
pub struct LogOptions<'a> {
    /// Debug-level console output for this crate
    pub verbose: bool,
    /// INFO and above
    pub info_log: Option<&'a Path>,
    /// ERROR only
    pub error_log: Option<&'a Path>,
}

/// Default console filter directive
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "picam_rs=debug"
    } else {
        "picam_rs=info"
    }
}

/// Install the global subscriber
pub fn init(options: &LogOptions<'_>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(options.verbose)));

    let console = fmt::layer().with_target(false).with_filter(env_filter);

    let info_file = options
        .info_log
        .map(open_log)
        .transpose()?
        .map(|file| file_layer(file).with_filter(file_filter(LevelFilter::INFO)));

    let error_file = options
        .error_log
        .map(open_log)
        .transpose()?
        .map(|file| file_layer(file).with_filter(file_filter(LevelFilter::ERROR)));

    tracing_subscriber::registry()
        .with(console)
        .with(info_file)
        .with(error_file)
        .try_init()?;

    Ok(())
}

fn file_layer<S>(file: Arc<File>) -> fmt::Layer<S, fmt::format::DefaultFields, fmt::format::Format, Arc<File>> {
    fmt::layer().with_writer(file).with_ansi(false)
}

/// This crate's events at `level` and above
fn file_filter(level: LevelFilter) -> Targets {
    Targets::new().with_target("picam_rs", level)
}

fn open_log(path: &Path) -> std::io::Result<Arc<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Arc::new(file))
}
