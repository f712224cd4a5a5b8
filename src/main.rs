mod api;
mod config;
mod error;
mod fetcher;
mod kpi;
mod normalize;
mod processors;
mod refresh;
mod types;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::cycle_stats::CycleStats;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{Endpoint, HttpSource};
use crate::refresh::RefreshOrchestrator;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    info!(
        api_base = %cfg.api_base,
        subscriber_id = cfg.subscriber_id,
        exclude_dev = cfg.exclude_dev,
        endpoints = Endpoint::ALL.len(),
        "Polling analytics backend at {}",
        cfg.api_base,
    );
    info!(
        "Auto-refresh {} every {}s, percent policy {:?}, request timeout {}",
        if cfg.auto_refresh { "on" } else { "off" },
        cfg.refresh_interval.as_secs(),
        cfg.percent_policy,
        cfg.request_timeout
            .map(|t| format!("{}s", t.as_secs()))
            .unwrap_or_else(|| "none".to_string()),
    );

    let source = Arc::new(HttpSource::new(&cfg)?);
    let stats = Arc::new(CycleStats::new()?);

    let (orchestrator, handle) = RefreshOrchestrator::new(source, &cfg, Arc::clone(&stats));
    tokio::spawn(orchestrator.run());

    // HTTP API server
    let api_state = ApiState {
        handle: handle.clone(),
        stats,
        refresh_interval_secs: cfg.refresh_interval.as_secs(),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    let shutdown_handle = handle.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            shutdown_handle.shutdown().await;
        })
        .await?;

    Ok(())
}
