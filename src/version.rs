// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the detection service

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-grounding-dino-2025-11-03";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2025-11-03";

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Grounding DINO Serve {} ({})", VERSION_NUMBER, BUILD_DATE)
}
