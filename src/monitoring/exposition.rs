// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/exposition.rs - Prometheus scrape output

use anyhow::{Context, Result};
use axum::http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

use super::metrics::HttpMetrics;

/// Content type of the Prometheus text format
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Whether the client accepts a gzip body
///
/// `gzip;q=0` counts as a refusal.
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|coding| {
            let mut parts = coding.split(';').map(str::trim);
            let name = parts.next().unwrap_or_default();
            if !name.eq_ignore_ascii_case("gzip") && name != "*" {
                return false;
            }
            !parts.any(|param| {
                param
                    .strip_prefix("q=")
                    .and_then(|q| q.parse::<f32>().ok())
                    .map(|q| q == 0.0)
                    .unwrap_or(false)
            })
        })
}

pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .context("Failed to compress metrics")?;
    encoder.finish().context("Failed to finish gzip stream")
}

/// Render the registry, gzipped when the request allows it
pub fn render(metrics: &HttpMetrics, headers: &HeaderMap) -> Result<Response> {
    let text = metrics
        .render_text()
        .context("Failed to encode metrics")?;

    if accepts_gzip(headers) {
        let body = gzip(text.as_bytes())?;
        return Ok((
            StatusCode::OK,
            [(CONTENT_TYPE, TEXT_CONTENT_TYPE), (CONTENT_ENCODING, "gzip")],
            body,
        )
            .into_response());
    }

    Ok((StatusCode::OK, [(CONTENT_TYPE, TEXT_CONTENT_TYPE)], text).into_response())
}
