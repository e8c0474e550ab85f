// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod generate;
pub mod http_server;
pub mod predict;

pub use errors::{ApiError, ErrorResponse};
pub use generate::{GenerateRequest, GenerateResponse};
pub use http_server::{
    create_app, start_server, AppState, HealthResponse, HealthStatus, PING_RESPONSE,
};
pub use predict::UPLOAD_FIELD;
