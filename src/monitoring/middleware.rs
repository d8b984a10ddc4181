// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/middleware.rs - Per-request instrumentation

use axum::body::HttpBody;
use axum::extract::{MatchedPath, Request, State};
use axum::http::header::CONTENT_LENGTH;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use std::time::Instant;

use super::metrics::{HttpMetrics, RequestObservation};

/// Record size, latency and count of every routed request
///
/// Requests without a matched route and excluded handlers pass through
/// untouched. Bodies and status codes are never altered.
pub async fn track_metrics(
    State(metrics): State<Arc<HttpMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let handler = match request.extensions().get::<MatchedPath>() {
        Some(path) => path.as_str().to_string(),
        None => return next.run(request).await,
    };
    if metrics.is_excluded(&handler) {
        return next.run(request).await;
    }

    let method = request.method().as_str().to_string();
    let request_size = content_length(request.headers())
        .or_else(|| request.body().size_hint().exact())
        .unwrap_or(0);

    let _in_progress = metrics.track_in_progress(&method, &handler);
    let start = Instant::now();

    let response = next.run(request).await;

    let latency_seconds = start.elapsed().as_secs_f64();
    let response_size = response
        .body()
        .size_hint()
        .exact()
        .or_else(|| content_length(response.headers()))
        .unwrap_or(0);

    metrics.observe(&RequestObservation {
        handler: &handler,
        method: &method,
        status: response.status(),
        request_size,
        response_size,
        latency_seconds,
    });

    response
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}
