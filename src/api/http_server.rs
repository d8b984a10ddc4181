// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Uri},
    middleware::from_fn_with_state,
    response::Response,
    routing::{get, post},
    Router,
};
use std::{future::Future, sync::Arc};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::detect::detect_handler;
use super::errors::ApiError;
use super::lifespan::DetectorSlot;
use crate::monitoring::{self, track_metrics, HttpMetrics};

#[derive(Clone)]
pub struct AppState {
    pub detectors: DetectorSlot,
    /// `None` when metrics are disabled
    pub metrics: Option<Arc<HttpMetrics>>,
}

impl AppState {
    pub fn new(detectors: DetectorSlot, metrics: Option<Arc<HttpMetrics>>) -> Self {
        Self { detectors, metrics }
    }

    /// State with an empty detector slot and no metrics
    pub fn new_for_test() -> Self {
        Self {
            detectors: Arc::new(RwLock::new(None)),
            metrics: None,
        }
    }
}

pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    let mut router = Router::new().route("/detect", post(detect_handler));

    if let Some(metrics) = state.metrics.clone() {
        router = router
            .route("/metrics", get(metrics_handler))
            .route_layer(from_fn_with_state(metrics, track_metrics));
    }

    router
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /metrics - Prometheus scrape endpoint
async fn metrics_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let metrics = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("/metrics".to_string()))?;

    monitoring::render(metrics, &headers).map_err(|e| {
        error!("Failed to render metrics: {:#}", e);
        ApiError::InternalError(e.to_string())
    })
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

/// Serve `app` on `addr` until `shutdown` resolves
pub async fn start_server<F>(addr: &str, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("🌐 API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    info!("API server stopped");
    Ok(())
}
