// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod detect;
pub mod errors;
pub mod http_server;
pub mod lifespan;

pub use detect::{detect_handler, DetectParams, ObjectDetectionViewModel};
pub use errors::{ApiError, ErrorResponse};
pub use http_server::{create_router, start_server, AppState};
pub use lifespan::{DetectorSlot, Lifespan};
