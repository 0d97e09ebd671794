mod arbitrage;
mod config;
mod domain;
mod feeds;
mod monitor;
mod notification;
mod scanner;
mod storage;

use config::Config;
use scanner::{Scanner, ScannerConfig};
use std::env;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

fn parse_config_path() -> String {
    for arg in env::args().skip(1) {
        if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    DEFAULT_CONFIG_PATH.to_string()
}

fn init_tracing(log_level: Option<&str>) {
    let level = match log_level {
        Some("debug") => Level::DEBUG,
        Some("info") => Level::INFO,
        Some("warn") | Some("warning") => Level::WARN,
        Some("error") => Level::ERROR,
        Some("trace") => Level::TRACE,
        _ => Level::INFO,
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[tokio::main]
async fn main() {
    let config_path = parse_config_path();

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config {}: {}", config_path, e);
            std::process::exit(1);
        }
    };

    init_tracing(config.app.log_level.as_deref());

    let scanner = match Scanner::new(ScannerConfig {
        app_config: config,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
    .await
    {
        Ok(scanner) => scanner,
        Err(e) => {
            error!(error = %e, "Failed to create scanner");
            std::process::exit(1);
        }
    };

    info!(config = %config_path, "Scanner initialized");

    let reason = tokio::select! {
        result = scanner.start() => match result {
            Ok(()) => "monitoring finished".to_string(),
            Err(e) => {
                error!(error = %e, "Scanner error");
                format!("error: {}", e)
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received");
            "Ctrl-C".to_string()
        }
    };

    scanner.stop(&reason).await;
}
