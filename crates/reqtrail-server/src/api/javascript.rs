//! Browser-side event reporting

use axum::{extract::State, http::StatusCode, Json};
use reqtrail_core::types::{AuditJavascript, NewAuditJavascript};
use serde::Deserialize;
use tracing::info;

use super::AppState;
use crate::error::{AppError, AppResult};

/// Body of `POST /audit/javascript`
#[derive(Debug, Deserialize)]
pub struct JavascriptReport {
    /// Entry of the page load that produced the event
    pub entry_id: i64,
    #[serde(flatten)]
    pub event: NewAuditJavascript,
}

/// Attach a browser event to the entry of the request that served the page
pub async fn record_javascript(
    State(state): State<AppState>,
    Json(report): Json<JavascriptReport>,
) -> AppResult<(StatusCode, Json<AuditJavascript>)> {
    if report.event.message.trim().is_empty() {
        return Err(AppError::BadRequest("message must not be empty".into()));
    }

    let Some(stored) = state
        .recorder
        .record_javascript(report.entry_id, &report.event)
        .await
    else {
        // The recorder has already reported why; tell a missing entry apart
        return match state.store.find_entry(report.entry_id).await? {
            None => Err(AppError::NotFound(format!("audit entry {}", report.entry_id))),
            Some(_) => Err(AppError::Internal("javascript event was not recorded".into())),
        };
    };

    info!(
        entry_id = report.entry_id,
        event_type = %stored.event_type,
        "Javascript event recorded"
    );

    Ok((StatusCode::ACCEPTED, Json(stored)))
}
