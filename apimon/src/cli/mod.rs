//! CLI module for apimon
//!
//! Provides the command-line interface and the shared startup wiring.

pub mod check;
pub mod serve;

use crate::auth::provider_from_config;
use crate::config::{database_url, MonitorConfig};
use crate::db::migrations::initialize_database;
use crate::health::probe::build_probe_client;
use crate::registry::EndpointRegistry;
use crate::shutdown::ShutdownController;
use crate::AppState;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

/// apimon - API health monitor
#[derive(Parser, Debug)]
#[command(name = "apimon")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    APIMON_HOST                   Bind address (default: 0.0.0.0)
    APIMON_PORT                   Listen port (default: 8787)
    APIMON_LOG_LEVEL              Log level (default: info)
    APIMON_DATABASE_URL           Database URL (default: sqlite:~/.apimon/apimon.db)
    APIMON_TARGET_BASE_URL        Base URL of the monitored service
    APIMON_REGISTRY_PATH          YAML endpoint catalog (default: built-in)
    APIMON_PROBE_INTERVAL_SECS    Probe cycle interval (default: 300)
    APIMON_PROBE_TIMEOUT_SECS     Per-probe timeout (default: 10)
    APIMON_HEALTH_RETENTION_DAYS  Health check retention (default: 7)
    APIMON_ERROR_RETENTION_DAYS   Error log retention (default: 30)
    APIMON_PROBE_USERNAME         Probe account username
    APIMON_PROBE_PASSWORD         Probe account password
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the monitor (scheduler + HTTP API)
    Serve(serve::ServeArgs),
    /// Run one probe cycle and print the summary as JSON
    Check(check::CheckArgs),
}

/// 環境変数から設定を読み、DB・レジストリ・認証を配線した状態を作る
pub async fn build_state(shutdown: ShutdownController) -> anyhow::Result<AppState> {
    let config = MonitorConfig::from_env();
    let database_url = database_url()?;
    let pool = initialize_database(&database_url)
        .await
        .with_context(|| format!("Failed to open database {}", database_url))?;

    let registry = EndpointRegistry::load(config.registry_path.as_deref())?;
    info!(
        endpoints = registry.len(),
        probed = registry.list_get_endpoints().len(),
        target = %config.target_base_url,
        "Endpoint registry loaded"
    );

    let credentials = provider_from_config(build_probe_client(config.probe_timeout)?, &config);
    let state = AppState::new(pool, config, Arc::new(registry), credentials, shutdown)?;
    Ok(state)
}
