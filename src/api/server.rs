// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP server: shared state, router and lifecycle

use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::visits::{
    create_visit_handler, delete_visit_handler, list_visits_handler, update_visit_status_handler,
};
use crate::storage::GatePassStore;
use crate::version;
use crate::vision::image_utils::MAX_IMAGE_SIZE;
use crate::vision::{PlateModelInfo, PlateVerifier};

/// Largest accepted request body: a maximum-size photo in base64 plus
/// 1 MiB for the remaining form fields
pub const MAX_REQUEST_BODY_SIZE: usize = MAX_IMAGE_SIZE / 3 * 4 + 4 + 1024 * 1024;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn GatePassStore>,
    /// Absent when plate models failed to load
    pub verifier: Option<Arc<PlateVerifier>>,
    /// Model availability reported by `/health`
    pub models: Vec<PlateModelInfo>,
}

impl AppState {
    pub fn new(store: Arc<dyn GatePassStore>, verifier: Option<Arc<PlateVerifier>>) -> Self {
        Self {
            store,
            verifier,
            models: Vec::new(),
        }
    }

    pub fn with_models(mut self, models: Vec<PlateModelInfo>) -> Self {
        self.models = models;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RootResponse {
    pub status: String,
    pub database: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub verifier_available: bool,
    pub store: String,
    pub models: Vec<PlateModelInfo>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route(
            "/api/visits",
            post(create_visit_handler).get(list_visits_handler),
        )
        .route(
            "/api/visits/:receipt_id/status",
            put(update_visit_status_handler),
        )
        .route(
            "/api/visits/:receipt_id",
            axum::routing::delete(delete_visit_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    let app = create_router(state);

    info!("🚀 Gate-pass API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Gate-pass API stopped");
    Ok(())
}

/// GET / - Liveness probe
pub async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(RootResponse {
        status: "Live".to_string(),
        database: format!("{} connected", state.store.name()),
    })
}

/// GET /health - Service and model status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: version::VERSION_NUMBER.to_string(),
        verifier_available: state.verifier.is_some(),
        store: state.store.name().to_string(),
        models: state.models.clone(),
    })
}
