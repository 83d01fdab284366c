//! Audit record types shared by the recorder, the stores and the front ends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::probe::MemoryUsage;

mod events;

pub use events::{
    AuditError, AuditJavascript, AuditTrail, NewAuditError, NewAuditJavascript, NewAuditTrail,
    User,
};

/// User id recorded for guests
pub const ANONYMOUS_USER_ID: i64 = 0;

/// Request method recorded for command-line executions
pub const CLI_REQUEST_METHOD: &str = "CLI";

// ============================================================================
// Capture Categories
// ============================================================================

/// Category tag attached to every captured data blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Get,
    Post,
    Cookies,
    Env,
    Files,
    Session,
    RequestHeaders,
    ResponseHeaders,
    Params,
}

impl DataType {
    /// Every tag, in capture order
    pub const ALL: [DataType; 9] = [
        DataType::Get,
        DataType::Post,
        DataType::Cookies,
        DataType::Env,
        DataType::Files,
        DataType::Session,
        DataType::RequestHeaders,
        DataType::ResponseHeaders,
        DataType::Params,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Cookies => "cookies",
            Self::Env => "env",
            Self::Files => "files",
            Self::Session => "session",
            Self::RequestHeaders => "request_headers",
            Self::ResponseHeaders => "response_headers",
            Self::Params => "params",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DataType {
    type Err = crate::TrailError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| crate::TrailError::codec(format!("Unknown data type tag: {}", s)))
    }
}

// ============================================================================
// Audit Entry
// ============================================================================

/// One audit record per request or command execution
///
/// Times are seconds since the Unix epoch with sub-second precision.
/// `id` and `created` are assigned by the store on insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Option<i64>,
    pub created: Option<DateTime<Utc>>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub duration: Option<f64>,
    /// 0 means anonymous
    pub user_id: Option<i64>,
    pub ip: Option<String>,
    pub referrer: Option<String>,
    /// `Location` header of the response, if any
    pub redirect: Option<String>,
    pub url: Option<String>,
    pub route: Option<String>,
    pub memory: Option<u64>,
    pub memory_max: Option<u64>,
    pub request_method: Option<String>,
}

impl AuditEntry {
    /// True until the store has assigned an id
    pub fn is_new_record(&self) -> bool {
        self.id.is_none()
    }

    /// Stamp the end of the execution.
    ///
    /// `duration` is derived from the stored start time so that
    /// `duration == end_time - start_time` holds exactly. The peak is never
    /// reported below the current usage.
    pub fn close(&mut self, end_time: f64, usage: MemoryUsage) {
        self.end_time = Some(end_time);
        self.duration = self.start_time.map(|start| end_time - start);
        self.memory = Some(usage.current);
        self.memory_max = Some(usage.peak.max(usage.current));
    }
}

/// Column of `audit_entry` that a partial update may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryField {
    StartTime,
    EndTime,
    Duration,
    UserId,
    Ip,
    Referrer,
    Redirect,
    Url,
    Route,
    Memory,
    MemoryMax,
    RequestMethod,
}

impl EntryField {
    /// Fields written when the request begins
    pub const INPUT: &'static [EntryField] = &[
        EntryField::StartTime,
        EntryField::UserId,
        EntryField::Ip,
        EntryField::Referrer,
        EntryField::Url,
        EntryField::Route,
        EntryField::RequestMethod,
    ];

    /// Fields written by finalize, and nothing else
    pub const FINALIZE: &'static [EntryField] = &[
        EntryField::EndTime,
        EntryField::Duration,
        EntryField::Memory,
        EntryField::MemoryMax,
        EntryField::Redirect,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Self::StartTime => "start_time",
            Self::EndTime => "end_time",
            Self::Duration => "duration",
            Self::UserId => "user_id",
            Self::Ip => "ip",
            Self::Referrer => "referrer",
            Self::Redirect => "redirect",
            Self::Url => "url",
            Self::Route => "route",
            Self::Memory => "memory",
            Self::MemoryMax => "memory_max",
            Self::RequestMethod => "request_method",
        }
    }
}

// ============================================================================
// Extra Data
// ============================================================================

/// A named, typed blob of captured input linked to one entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditData {
    pub id: i64,
    pub entry_id: i64,
    /// Display label, e.g. `$_GET`
    pub name: String,
    pub data: JsonValue,
    #[serde(rename = "type")]
    pub data_type: Option<DataType>,
    pub created: DateTime<Utc>,
}

/// Input for creating an [`AuditData`] row
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditData {
    pub name: String,
    pub data: JsonValue,
    pub data_type: Option<DataType>,
}

impl NewAuditData {
    pub fn new(name: impl Into<String>, data: JsonValue, data_type: Option<DataType>) -> Self {
        Self {
            name: name.into(),
            data,
            data_type,
        }
    }
}
