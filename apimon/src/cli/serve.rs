//! serve サブコマンド
//!
//! スケジューラーとHTTP APIを起動し、Ctrl-Cで両方を止める。

use crate::api::create_app;
use crate::shutdown::ShutdownController;
use anyhow::Context;
use clap::{Args, Parser};
use tracing::{info, warn};

/// serve サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Listen port
    #[arg(short, long, default_value = "8787", env = "APIMON_PORT")]
    pub port: u16,

    /// Bind address
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "APIMON_HOST")]
    pub host: String,
}

/// サブコマンド省略時に`ServeArgs`だけを解決するためのパーサー
#[derive(Parser, Debug)]
#[command(name = "apimon")]
struct DefaultServeCommand {
    #[command(flatten)]
    args: ServeArgs,
}

impl ServeArgs {
    /// フラグなしの`serve`と同じ引数（`APIMON_HOST` / `APIMON_PORT`を反映）
    pub fn from_env() -> Result<Self, clap::Error> {
        DefaultServeCommand::try_parse_from(["apimon"]).map(|command| command.args)
    }
}

/// サーバーを起動し、終了要求まで待つ
pub async fn execute(args: &ServeArgs) -> anyhow::Result<()> {
    info!("apimon v{}", env!("CARGO_PKG_VERSION"));

    let shutdown = ShutdownController::new();
    let state = super::build_state(shutdown.clone()).await?;

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
            }
            shutdown.request_shutdown();
        });
    }

    let scheduler = state.scheduler.clone();
    scheduler.start();

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    let app = create_app(state);
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.wait().await })
        .await
        .context("HTTP server error")?;

    scheduler.stop().await;
    info!("apimon stopped");
    Ok(())
}
