//! linewatch - GPIO line monitor
//!
//! Watches digital input lines and broadcasts every state change to TCP
//! listeners and/or the log.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

use linewatch::app::Monitor;
use linewatch::cli::{Args, LogFormat};
use linewatch::config::AppConfig;
use linewatch::lines;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let _log_guard = init_logging(&args.log_level, args.log_format, args.log_file.as_deref())?;

    info!("Starting linewatch v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => {
            info!("Configuration file: {}", path.display());
            AppConfig::load(path).await?
        }
        None => AppConfig::default(),
    };
    config.apply_args(&args);
    let settings = config.settings().context("Invalid configuration")?;

    if args.check {
        println!("{}", settings);
        return Ok(());
    }

    let reader = lines::open(settings.backend, &settings.gpio_root)
        .context("Failed to open line access")?;

    let monitor = Monitor::start(&settings, reader).await?;
    let stats = monitor.run_until(shutdown_signal()).await?;

    info!(
        changes = stats.broadcast,
        connections = stats.accepted,
        "linewatch shutdown complete"
    );
    Ok(())
}

/// Initialize tracing; the returned guard flushes the log file on drop
fn init_logging(level: &str, format: LogFormat, file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level: {}", level))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    layers.push(match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    });

    let guard = match file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let name = path
                .file_name()
                .with_context(|| format!("Log file path has no file name: {}", path.display()))?;

            let appender = tracing_appender::rolling::daily(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install CTRL+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}
