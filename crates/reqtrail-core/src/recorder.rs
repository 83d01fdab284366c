//! Request lifecycle recording
//!
//! [`AuditRecorder`] is the shared, cheaply clonable service. Each execution
//! gets its own [`ActiveEntry`] from [`AuditRecorder::begin`] (or
//! [`AuditRecorder::create`]) and drives it through `record` and `finalize`.
//!
//! Nothing here returns an error to the host. Storage failures turn into
//! `None` / `false` results and are reported to the diagnostic hook, so a
//! broken audit database never breaks the request being audited.

use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::context::{CaptureContext, RequestKind, ResponseContext};
use crate::compact::compact;
use crate::error::TrailError;
use crate::probe::{now_seconds, MemoryProbe, ProcessMemory};
use crate::store::AuditEntryStore;
use crate::types::{
    AuditData, AuditEntry, AuditError, AuditJavascript, AuditTrail, DataType, EntryField,
    NewAuditData, NewAuditError, NewAuditJavascript, NewAuditTrail, CLI_REQUEST_METHOD,
};

/// A swallowed storage failure
#[derive(Debug)]
pub struct AuditFailure<'a> {
    /// Recorder operation that failed, e.g. `"finalize"`
    pub operation: &'static str,
    pub entry_id: Option<i64>,
    pub error: &'a TrailError,
}

impl fmt::Display for AuditFailure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entry_id {
            Some(id) => write!(f, "{} failed for entry {}: {}", self.operation, id, self.error),
            None => write!(f, "{} failed: {}", self.operation, self.error),
        }
    }
}

/// Callback receiving every swallowed storage failure
pub type DiagnosticHook = Arc<dyn Fn(&AuditFailure<'_>) + Send + Sync>;

fn log_failure(failure: &AuditFailure<'_>) {
    warn!(
        operation = failure.operation,
        entry_id = ?failure.entry_id,
        error = %failure.error,
        "Audit write dropped"
    );
}

/// Shared recording service
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditEntryStore>,
    memory: Arc<dyn MemoryProbe>,
    diagnostics: DiagnosticHook,
}

impl AuditRecorder {
    /// Recorder sampling this process's memory and logging failures
    pub fn new(store: Arc<dyn AuditEntryStore>) -> Self {
        Self {
            store,
            memory: Arc::new(ProcessMemory::new()),
            diagnostics: Arc::new(log_failure),
        }
    }

    pub fn with_memory_probe(mut self, memory: Arc<dyn MemoryProbe>) -> Self {
        self.memory = memory;
        self
    }

    /// Replace the default `tracing` diagnostic hook
    pub fn with_diagnostics(mut self, hook: DiagnosticHook) -> Self {
        self.diagnostics = hook;
        self
    }

    pub fn store(&self) -> &Arc<dyn AuditEntryStore> {
        &self.store
    }

    /// New, unsaved entry
    pub fn create(&self) -> ActiveEntry {
        ActiveEntry {
            recorder: self.clone(),
            entry: AuditEntry::default(),
        }
    }

    /// New entry with the context already recorded
    pub async fn begin(&self, context: &CaptureContext) -> ActiveEntry {
        let mut active = self.create();
        active.record(context).await;
        active
    }

    /// Attach a javascript event to an existing entry by id
    pub async fn record_javascript(
        &self,
        entry_id: i64,
        event: &NewAuditJavascript,
    ) -> Option<AuditJavascript> {
        if !self.entry_exists(entry_id, "record_javascript").await {
            return None;
        }
        let result = self.store.insert_javascript(entry_id, event).await;
        self.settle("record_javascript", Some(entry_id), result)
    }

    /// Attach an error to an existing entry by id
    pub async fn record_error(&self, entry_id: i64, error: &NewAuditError) -> Option<AuditError> {
        if !self.entry_exists(entry_id, "record_error").await {
            return None;
        }
        let result = self.store.insert_error(entry_id, error).await;
        self.settle("record_error", Some(entry_id), result)
    }

    /// Attach a trail point to an existing entry by id
    pub async fn record_trail(&self, entry_id: i64, trail: &NewAuditTrail) -> Option<AuditTrail> {
        if !self.entry_exists(entry_id, "record_trail").await {
            return None;
        }
        let result = self.store.insert_trail(entry_id, trail).await;
        self.settle("record_trail", Some(entry_id), result)
    }

    async fn entry_exists(&self, entry_id: i64, operation: &'static str) -> bool {
        let found = self.store.find_entry(entry_id).await;
        matches!(self.settle(operation, Some(entry_id), found), Some(Some(_)))
    }

    fn settle<T>(
        &self,
        operation: &'static str,
        entry_id: Option<i64>,
        result: crate::Result<T>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                (self.diagnostics)(&AuditFailure {
                    operation,
                    entry_id,
                    error: &error,
                });
                None
            },
        }
    }
}

impl fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}

/// The entry of one in-flight execution
#[derive(Debug)]
pub struct ActiveEntry {
    recorder: AuditRecorder,
    entry: AuditEntry,
}

impl ActiveEntry {
    pub fn entry(&self) -> &AuditEntry {
        &self.entry
    }

    pub fn id(&self) -> Option<i64> {
        self.entry.id
    }

    /// Capture the execution's inputs and persist them.
    ///
    /// The entry row is written first; each captured collection then becomes
    /// one extra-data row. When the entry row cannot be written no children
    /// are attempted.
    pub async fn record(&mut self, context: &CaptureContext) {
        self.entry.route = context.route.clone();
        self.entry.start_time = Some(context.started_at);

        match &context.request {
            RequestKind::Web(web) => {
                self.entry.user_id = Some(web.user.audit_id());
                self.entry.url = Some(web.url.clone());
                self.entry.ip = web.ip.clone();
                self.entry.referrer = web.referrer.clone();
                self.entry.request_method = Some(web.method.clone());
            },
            RequestKind::Console(console) => {
                self.entry.url = Some(console.script_file.clone());
                self.entry.request_method = Some(CLI_REQUEST_METHOD.to_string());
            },
            RequestKind::Unknown => {},
        }

        if !self.save_inputs().await {
            return;
        }

        for capture in context.captures() {
            self.add_data(capture.name, capture.data, Some(capture.data_type))
                .await;
        }

        debug!(
            entry_id = ?self.entry.id,
            method = ?self.entry.request_method,
            url = ?self.entry.url,
            "Recorded audit entry"
        );
    }

    async fn save_inputs(&mut self) -> bool {
        let store = Arc::clone(&self.recorder.store);

        if let Some(id) = self.entry.id {
            let result = store.update_entry(&self.entry, EntryField::INPUT).await;
            return self.recorder.settle("record", Some(id), result).is_some();
        }

        let result = store.insert_entry(&self.entry).await;
        match self.recorder.settle("record", None, result) {
            Some((id, created)) => {
                self.entry.id = Some(id);
                self.entry.created = Some(created);
                true
            },
            None => false,
        }
    }

    /// Store a named blob for this entry; `None` while the entry is unsaved
    pub async fn add_data(
        &self,
        name: impl Into<String>,
        data: JsonValue,
        data_type: Option<DataType>,
    ) -> Option<AuditData> {
        let id = self.entry.id?;
        let result = self
            .recorder
            .store
            .insert_data(id, &NewAuditData::new(name, data, data_type))
            .await;
        self.recorder.settle("add_data", Some(id), result)
    }

    pub async fn add_error(&self, error: &NewAuditError) -> Option<AuditError> {
        let id = self.entry.id?;
        let result = self.recorder.store.insert_error(id, error).await;
        self.recorder.settle("add_error", Some(id), result)
    }

    pub async fn add_trail(&self, trail: &NewAuditTrail) -> Option<AuditTrail> {
        let id = self.entry.id?;
        let result = self.recorder.store.insert_trail(id, trail).await;
        self.recorder.settle("add_trail", Some(id), result)
    }

    pub async fn add_javascript(&self, event: &NewAuditJavascript) -> Option<AuditJavascript> {
        let id = self.entry.id?;
        let result = self.recorder.store.insert_javascript(id, event).await;
        self.recorder.settle("add_javascript", Some(id), result)
    }

    /// Stamp timing and memory, capture the response, and save those fields.
    ///
    /// Only end time, duration, memory counters and redirect are written;
    /// the captured inputs are left as recorded.
    pub async fn finalize(&mut self, response: Option<&ResponseContext>) -> bool {
        let usage = self.recorder.memory.sample();
        self.entry.close(now_seconds(), usage);

        if let Some(response) = response {
            self.entry.redirect = response.location();
            self.add_data(
                "Response Headers",
                compact(&response.headers, true),
                Some(DataType::ResponseHeaders),
            )
            .await;
        }

        let store = Arc::clone(&self.recorder.store);
        let result = store.update_entry(&self.entry, EntryField::FINALIZE).await;
        let saved = self
            .recorder
            .settle("finalize", self.entry.id, result)
            .is_some();

        debug!(
            entry_id = ?self.entry.id,
            duration = ?self.entry.duration,
            saved,
            "Finalized audit entry"
        );
        saved
    }
}
