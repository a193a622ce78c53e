// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod server;
pub mod visits;

pub use errors::{ApiError, ErrorResponse};
pub use server::{
    create_router, serve, AppState, HealthResponse, RootResponse, MAX_REQUEST_BODY_SIZE,
};
pub use visits::{CreateVisitResponse, MessageResponse, UpdateStatusRequest};
