// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/mod.rs - Main monitoring module

pub mod exposition;
pub mod metrics;
pub mod middleware;

// Re-export main types
pub use exposition::{accepts_gzip, render, TEXT_CONTENT_TYPE};
pub use metrics::{
    HttpMetrics, InProgressGuard, MetricsConfig, RequestObservation, DEFAULT_LATENCY_BUCKETS,
};
pub use middleware::track_metrics;
