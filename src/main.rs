// Main entrypoint for the csiproxy application.

use csiproxy::app;
use csiproxy::config::{Config, ConfigTrait};
use csiproxy::shutdown::GracefulShutdown;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const CONFIG_PATH: &str = "cfg/csiproxy.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/csiproxy.cfg.local.yaml";

/// csiproxy - host storage and service management API for CSI node plugins
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,
}

/// Number of runtime worker threads; zero means all available cores.
fn worker_threads(cfg: &Config) -> usize {
    let cores = cfg.runtime().num_cpus;
    if cores == 0 {
        num_cpus::get()
    } else {
        cores
    }
}

/// Loads the configuration struct from YAML file.
/// Tries local config first, then falls back to default config.
fn load_cfg(path: Option<PathBuf>) -> Result<(Config, String)> {
    if let Some(custom_path) = path {
        let cfg = Config::load(&custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        return Ok((cfg, custom_path.display().to_string()));
    }

    match Config::load(PathBuf::from(CONFIG_PATH_LOCAL)) {
        Ok(cfg) => Ok((cfg, CONFIG_PATH_LOCAL.to_string())),
        Err(_) => {
            let cfg = Config::load(PathBuf::from(CONFIG_PATH))
                .with_context(|| format!("failed to load config from {}", CONFIG_PATH))?;
            Ok((cfg, CONFIG_PATH.to_string()))
        }
    }
}

/// Configures structured logging based on configuration.
fn configure_logger(cfg: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_level = cfg
        .logs()
        .and_then(|logs| logs.level.as_ref())
        .map(|s| s.as_str())
        .unwrap_or("debug");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cfg.is_prod() {
        // Production: JSON format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        // Development: Pretty console format
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // The logger depends on the config, so it is loaded before the runtime exists.
    let (cfg, path) = load_cfg(args.cfg)?;
    configure_logger(&cfg);
    info!(component = "config", event = "load_success", path = %path, "config loaded");

    let threads = worker_threads(&cfg);
    if cfg.runtime().num_cpus == 0 {
        info!(component = "main", event = "num_cpus_configured", num_cpus = threads, "using all available cores");
    } else {
        warn!(component = "main", event = "num_cpus_configured", num_cpus = threads, "available cores value configured");
    }

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(threads)
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?
        .block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<()> {
    let shutdown_token = CancellationToken::new();
    let graceful_shutdown = GracefulShutdown::new(shutdown_token.clone(), cfg.shutdown_timeout());

    let app = app::App::new(&cfg);
    let server = app.server();

    let (listening_tx, listening_rx) = oneshot::channel();
    let serving = tokio::spawn(async move { app.serve(Some(listening_tx)).await });

    let endpoints = cfg.endpoints();
    tokio::spawn(async move {
        if listening_rx.await.is_ok() {
            info!(component = "main", event = "listening", endpoints = ?endpoints, "csiproxy is listening");
        }
    });

    if let Err(e) = graceful_shutdown.await_shutdown(server, serving).await {
        error!(
            component = "main",
            scope = "service",
            event = "graceful_shutdown_failed",
            error = %e,
            "failed to gracefully shut down service"
        );
        return Err(e);
    }

    Ok(())
}
