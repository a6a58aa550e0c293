use anyhow::{Context, Result};
use clap::Parser;
use rtms_relay::{
    create_router, AppState, Config, LogSink, RelayContext, SessionCoordinator, WsConnector,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rtms-relay", about = "Relay Zoom RTMS transcripts from webhook events")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/rtms-relay")]
    config: String,

    /// Override the HTTP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cfg = Config::load(&cli.config)?;
    let credentials = cfg.credentials()?;

    info!("Loaded config: {}", cfg.service.name);
    info!("Zoom client id: {}", credentials.client_id());

    let ctx = RelayContext::new(
        credentials,
        Arc::new(WsConnector::new()),
        Arc::new(LogSink),
        cfg.relay.clone(),
    );
    let coordinator = SessionCoordinator::new(ctx);
    let app = create_router(AppState::new(coordinator.clone()));

    let port = cli.port.unwrap_or(cfg.service.http.port);
    let addr = format!("{}:{}", cfg.service.http.bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Server is listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("HTTP server failed")?;

    coordinator.shutdown().await;
    info!("All sessions closed");

    Ok(())
}
