//! Reqtrail server library
//!
//! HTTP integration for the reqtrail audit recorder.
//!
//! - **Audit middleware**: [`audit::AuditLayer`] records one entry per request
//! - **API**: `POST /audit/javascript` for browser events, `GET /health`
//! - **Configuration**: environment-based, see [`config::Config::load`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use reqtrail_core::{SqliteAuditStore, SqliteStoreOptions};
//! use reqtrail_server::{api, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let store = SqliteAuditStore::open(&config.database.path, SqliteStoreOptions::default())?;
//!     let app = api::router(api::AppState::new(Arc::new(store)), &config);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod middleware;
pub mod serve;

pub use error::{AppError, AppResult};
