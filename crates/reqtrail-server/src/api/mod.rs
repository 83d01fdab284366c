//! HTTP routes of the audit server

mod javascript;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use reqtrail_core::{AuditEntryStore, AuditRecorder};
use serde_json::json;

use crate::audit::{stamp_request_start, AuditLayer};
use crate::config::Config;
use crate::middleware::{cors_layer, tracing_layer};

pub use javascript::{record_javascript, JavascriptReport};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AuditEntryStore>,
    pub recorder: AuditRecorder,
}

impl AppState {
    pub fn new(store: Arc<dyn AuditEntryStore>) -> Self {
        Self {
            recorder: AuditRecorder::new(Arc::clone(&store)),
            store,
        }
    }
}

/// Build the application router with all routes and middleware
pub fn router(state: AppState, config: &Config) -> Router {
    let audit = AuditLayer::new(state.recorder.clone(), config.audit.clone());

    Router::new()
        .route("/health", get(health))
        .route("/audit/javascript", post(record_javascript))
        .with_state(state)
        // Innermost first
        .layer(audit)
        .layer(tracing_layer())
        .layer(cors_layer(&config.cors))
        .layer(from_fn(stamp_request_start))
}

async fn health(State(state): State<AppState>) -> Response {
    match state.store.list_entries(1).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Audit store health check failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        },
    }
}
