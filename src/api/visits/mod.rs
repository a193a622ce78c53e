// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Gate-pass API endpoints
//!
//! Provides the `/api/visits` routes for registering, listing, approving
//! and deleting gate passes.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{
    create_visit_handler, delete_visit_handler, list_visits_handler, update_visit_status_handler,
};
pub use request::UpdateStatusRequest;
pub use response::{CreateVisitResponse, MessageResponse};
