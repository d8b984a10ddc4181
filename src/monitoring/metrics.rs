// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/metrics.rs - HTTP request metrics

use axum::http::StatusCode;
use prometheus::{
    exponential_buckets, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use serde::{Deserialize, Serialize};

/// Label names shared by the four request metric families
pub const REQUEST_LABELS: &[&str] = &["handler", "method", "status"];

/// Label names of the in-progress gauge
pub const INPROGRESS_LABELS: &[&str] = &["method", "handler"];

/// Default latency buckets in seconds
pub const DEFAULT_LATENCY_BUCKETS: &[f64] = &[0.1, 0.5, 1.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub namespace: String,
    pub subsystem: String,
    /// Matched routes that are never instrumented
    pub excluded_handlers: Vec<String>,
    /// Report `2xx` instead of `200`
    pub group_status_codes: bool,
    pub inprogress_name: String,
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            namespace: "fastapi".to_string(),
            subsystem: "model".to_string(),
            excluded_handlers: vec!["/metrics".to_string()],
            group_status_codes: true,
            inprogress_name: "fastapi_inprogress".to_string(),
            latency_buckets: DEFAULT_LATENCY_BUCKETS.to_vec(),
        }
    }
}

/// One finished request as seen by the middleware
#[derive(Debug, Clone)]
pub struct RequestObservation<'a> {
    pub handler: &'a str,
    pub method: &'a str,
    pub status: StatusCode,
    pub request_size: u64,
    pub response_size: u64,
    pub latency_seconds: f64,
}

/// Prometheus collectors for HTTP traffic, registered on their own registry
pub struct HttpMetrics {
    config: MetricsConfig,
    registry: Registry,
    request_size: HistogramVec,
    response_size: HistogramVec,
    latency: HistogramVec,
    requests: IntCounterVec,
    in_progress: IntGaugeVec,
}

impl HttpMetrics {
    pub fn new(config: MetricsConfig) -> prometheus::Result<Self> {
        let registry = Registry::new();
        let size_buckets = exponential_buckets(64.0, 4.0, 10)?;

        let request_size = HistogramVec::new(
            HistogramOpts::new(
                "http_request_size_bytes",
                "Content length of incoming requests by handler.",
            )
            .namespace(config.namespace.clone())
            .subsystem(config.subsystem.clone())
            .buckets(size_buckets.clone()),
            REQUEST_LABELS,
        )?;

        let response_size = HistogramVec::new(
            HistogramOpts::new(
                "http_response_size_bytes",
                "Content length of outgoing responses by handler.",
            )
            .namespace(config.namespace.clone())
            .subsystem(config.subsystem.clone())
            .buckets(size_buckets),
            REQUEST_LABELS,
        )?;

        let latency = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Duration of HTTP requests in seconds.",
            )
            .namespace(config.namespace.clone())
            .subsystem(config.subsystem.clone())
            .buckets(config.latency_buckets.clone()),
            REQUEST_LABELS,
        )?;

        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of requests by handler.")
                .namespace(config.namespace.clone())
                .subsystem(config.subsystem.clone()),
            REQUEST_LABELS,
        )?;

        let in_progress = IntGaugeVec::new(
            Opts::new(
                config.inprogress_name.clone(),
                "Number of HTTP requests in progress.",
            ),
            INPROGRESS_LABELS,
        )?;

        registry.register(Box::new(request_size.clone()))?;
        registry.register(Box::new(response_size.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(in_progress.clone()))?;

        Ok(Self {
            config,
            registry,
            request_size,
            response_size,
            latency,
            requests,
            in_progress,
        })
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn is_excluded(&self, handler: &str) -> bool {
        self.config.excluded_handlers.iter().any(|h| h == handler)
    }

    /// Label value for a status code, grouped to `Nxx` when configured
    pub fn status_label(&self, status: StatusCode) -> String {
        if self.config.group_status_codes {
            format!("{}xx", status.as_u16() / 100)
        } else {
            status.as_u16().to_string()
        }
    }

    /// Count a request as in flight until the returned guard is dropped
    pub fn track_in_progress(&self, method: &str, handler: &str) -> InProgressGuard {
        let gauge = self.in_progress.with_label_values(&[method, handler]);
        gauge.inc();
        InProgressGuard { gauge }
    }

    pub fn observe(&self, observation: &RequestObservation<'_>) {
        let status = self.status_label(observation.status);
        let labels = [observation.handler, observation.method, status.as_str()];

        self.request_size
            .with_label_values(&labels)
            .observe(observation.request_size as f64);
        self.response_size
            .with_label_values(&labels)
            .observe(observation.response_size as f64);
        self.latency
            .with_label_values(&labels)
            .observe(observation.latency_seconds);
        self.requests.with_label_values(&labels).inc();
    }

    /// Current request count for one label set
    pub fn request_count(&self, handler: &str, method: &str, status: &str) -> u64 {
        self.requests
            .get_metric_with_label_values(&[handler, method, status])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    pub fn in_progress(&self, method: &str, handler: &str) -> i64 {
        self.in_progress
            .get_metric_with_label_values(&[method, handler])
            .map(|g| g.get())
            .unwrap_or(0)
    }

    /// Render the registry in the Prometheus text format
    pub fn render_text(&self) -> prometheus::Result<String> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

impl std::fmt::Debug for HttpMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMetrics")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Decrements the in-progress gauge on drop
pub struct InProgressGuard {
    gauge: IntGauge,
}

impl Drop for InProgressGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}
