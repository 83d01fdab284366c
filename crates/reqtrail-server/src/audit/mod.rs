//! Request auditing for axum applications
//!
//! Wrap a router in [`AuditLayer`] to record one entry per request:
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{routing::get, Router};
//! use reqtrail_core::{AuditRecorder, SqliteAuditStore, SqliteStoreOptions};
//! use reqtrail_server::audit::{stamp_request_start, AuditLayer};
//! use reqtrail_server::config::AuditConfig;
//!
//! # fn example() -> reqtrail_core::Result<()> {
//! let store = SqliteAuditStore::open("audit.db", SqliteStoreOptions::default())?;
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "ok" }))
//!     .layer(AuditLayer::new(
//!         AuditRecorder::new(Arc::new(store)),
//!         AuditConfig::default(),
//!     ))
//!     .layer(axum::middleware::from_fn(stamp_request_start));
//! # Ok(())
//! # }
//! ```
//!
//! [`stamp_request_start`] should be the outermost layer so the entry's start
//! time covers every layer in between. Outer layers can enrich the record by
//! inserting [`SessionData`] or [`AuthenticatedUser`] into the request
//! extensions.
//! Handlers read the current entry id from the [`AuditEntryId`] extension.

mod extract;
mod middleware;

pub use extract::{
    parse_cookies, parse_form, web_request, AuditEntryId, AuthenticatedUser, BodyCapture,
    RequestStart, SessionData, USER_ID_HEADER,
};
pub use middleware::{stamp_request_start, AuditLayer, AuditMiddleware};
