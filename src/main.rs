// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use grounding_dino_serve::{
    api::{create_router, start_server, AppState, Lifespan},
    config::ServerConfig,
    monitoring::HttpMetrics,
    version,
};
use std::{env, sync::Arc};
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    info!("🚀 Starting {}", version::get_version_string());
    info!("📦 BUILD VERSION: {}", version::VERSION);

    let config = ServerConfig::parse();

    // The detector must exist before the listener accepts anything
    let lifespan = Lifespan::startup(config.detector_config())?;

    let metrics = if config.enable_metrics {
        let metrics = HttpMetrics::new(config.metrics_config())?;
        info!(
            "📊 Metrics enabled: {}_{}_*",
            config.metrics_namespace, config.metrics_subsystem
        );
        Some(Arc::new(metrics))
    } else {
        warn!("Metrics disabled, /metrics will not be served");
        None
    };

    let state = AppState::new(lifespan.slot(), metrics);
    let app = create_router(state, config.max_upload_bytes);

    let served = start_server(&config.bind_addr(), app, shutdown_signal()).await;

    lifespan.shutdown().await;
    served
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await
        }
    }
}
