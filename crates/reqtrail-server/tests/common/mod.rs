//! Shared fixtures for reqtrail-server integration tests

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response, Router};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use reqtrail_core::types::{
    AuditData, AuditEntry, AuditError, AuditJavascript, AuditTrail, EntryField, NewAuditData,
    NewAuditError, NewAuditJavascript, NewAuditTrail, User,
};
use reqtrail_core::{AuditEntryStore, Result, SqliteAuditStore, SqliteStoreOptions, TrailError};
use reqtrail_server::api::{self, AppState};
use reqtrail_server::config::Config;
use tower::ServiceExt;

/// Server router over a private in-memory store
pub struct TestApp {
    pub store: Arc<SqliteAuditStore>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(
            SqliteAuditStore::open_in_memory(SqliteStoreOptions::default())
                .expect("in-memory store"),
        );
        let router = api::router(AppState::new(store.clone()), &config);
        Self { store, router }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// The most recently created entry
    pub async fn last_entry(&self) -> Option<AuditEntry> {
        self.store
            .list_entries(1)
            .await
            .expect("list entries")
            .into_iter()
            .next()
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

/// Store rejecting every operation
pub struct FailingStore;

fn offline<T>() -> Result<T> {
    Err(TrailError::lock("store offline"))
}

#[async_trait]
impl AuditEntryStore for FailingStore {
    async fn insert_entry(&self, _: &AuditEntry) -> Result<(i64, DateTime<Utc>)> {
        offline()
    }

    async fn update_entry(&self, _: &AuditEntry, _: &[EntryField]) -> Result<()> {
        offline()
    }

    async fn insert_data(&self, _: i64, _: &NewAuditData) -> Result<AuditData> {
        offline()
    }

    async fn insert_error(&self, _: i64, _: &NewAuditError) -> Result<AuditError> {
        offline()
    }

    async fn insert_trail(&self, _: i64, _: &NewAuditTrail) -> Result<AuditTrail> {
        offline()
    }

    async fn insert_javascript(&self, _: i64, _: &NewAuditJavascript) -> Result<AuditJavascript> {
        offline()
    }

    async fn find_entry(&self, _: i64) -> Result<Option<AuditEntry>> {
        offline()
    }

    async fn list_entries(&self, _: usize) -> Result<Vec<AuditEntry>> {
        offline()
    }

    async fn find_data(&self, _: i64) -> Result<Vec<AuditData>> {
        offline()
    }

    async fn find_errors(&self, _: i64) -> Result<Vec<AuditError>> {
        offline()
    }

    async fn find_trail(&self, _: i64) -> Result<Vec<AuditTrail>> {
        offline()
    }

    async fn find_javascript(&self, _: i64) -> Result<Vec<AuditJavascript>> {
        offline()
    }

    async fn find_user(&self, _: i64) -> Result<Option<User>> {
        offline()
    }
}
