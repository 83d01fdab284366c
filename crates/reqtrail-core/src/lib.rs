//! Reqtrail core library
//!
//! Records one audit entry per HTTP request or command invocation: the
//! captured inputs, timing, memory usage, and the errors, trail points and
//! browser-side javascript events attached to it.
//!
//! # Overview
//!
//! - **Recorder**: [`AuditRecorder`] and the per-execution [`ActiveEntry`]
//! - **Context**: explicit request/response snapshots fed to the recorder
//! - **Store**: the [`AuditEntryStore`] contract and its SQLite implementation
//! - **Logging**: shared `tracing` setup for the reqtrail binaries
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use reqtrail_core::context::{CaptureContext, RequestKind};
//! use reqtrail_core::probe::now_seconds;
//! use reqtrail_core::{AuditRecorder, SqliteAuditStore, SqliteStoreOptions};
//!
//! # async fn run() -> reqtrail_core::Result<()> {
//! let store = SqliteAuditStore::open("audit.db", SqliteStoreOptions::default())?;
//! let recorder = AuditRecorder::new(Arc::new(store));
//!
//! let mut entry = recorder
//!     .begin(&CaptureContext::new(now_seconds(), RequestKind::Unknown))
//!     .await;
//! entry.finalize(None).await;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod codec;
pub mod compact;
pub mod context;
pub mod error;
pub mod logging;
pub mod probe;
pub mod recorder;
pub mod store;
pub mod types;

pub use error::{Result, TrailError};
pub use recorder::{ActiveEntry, AuditFailure, AuditRecorder, DiagnosticHook};
pub use store::{AuditEntryStore, SqliteAuditStore, SqliteStoreOptions};
