//! `picam` binary: serve the live camera and record until interrupted

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use picam_rs::config::CamConfig;
use picam_rs::context::CameraContext;
use picam_rs::logging::{self, LogOptions};
use picam_rs::recorder::RecorderState;
use picam_rs::server::HttpServer;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "picam.toml")]
    config: PathBuf,

    /// Debug-level console logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the interpreted configuration and exit
    #[arg(long)]
    print_config: bool,
}

/// Why the serve loop ended
enum Exit {
    Requested,
    Fatal(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            eprintln!("picam: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> picam_rs::Result<ExitCode> {
    let loaded = CamConfig::load_optional(&args.config)?;
    let from_file = loaded.is_some();
    let config = loaded.unwrap_or_default();

    if args.print_config {
        println!("# {}", args.config.display());
        print!("{}", config.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    logging::init(&LogOptions {
        verbose: args.verbose,
        info_log: config.info_log.as_deref(),
        error_log: config.error_log.as_deref(),
    })?;

    if !from_file {
        tracing::info!(path = %args.config.display(), "No config file; using defaults");
    }

    tracing::info!(
        config = %args.config.display(),
        port = config.port,
        width = config.video_width,
        height = config.video_height,
        interval_secs = config.recording_interval,
        dir = %config.recordings_dir.display(),
        "Starting picam"
    );

    let mut context = CameraContext::start(&config).await?;
    let server = HttpServer::new(config.server(), context.app_state());
    let mut recorder_state = context.recorder_state();

    let exit = tokio::select! {
        result = server.run() => match result {
            Ok(()) => Exit::Requested,
            Err(e) => Exit::Fatal(format!("HTTP server failed: {}", e)),
        },
        _ = shutdown_signal() => Exit::Requested,
        _ = recorder_state.wait_for(|s| *s == RecorderState::Failed) => {
            Exit::Fatal("recorder failed".into())
        }
        result = context.capture_exited() => match result {
            Ok(()) => Exit::Requested,
            Err(e) => Exit::Fatal(e.to_string()),
        },
    };

    if let Exit::Fatal(reason) = &exit {
        tracing::error!(reason = %reason, "Stopping after fatal error");
    }

    let state = context.shutdown(config.shutdown_timeout()).await;

    match exit {
        Exit::Requested if state == RecorderState::Stopped => Ok(ExitCode::SUCCESS),
        Exit::Requested => {
            tracing::warn!(state = %state, "Recorder did not stop cleanly");
            Ok(ExitCode::FAILURE)
        }
        Exit::Fatal(_) => Ok(ExitCode::FAILURE),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl-C received"),
        _ = terminate => tracing::info!("SIGTERM received"),
    }
}
