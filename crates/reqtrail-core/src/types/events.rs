//! Event streams attached to an entry: errors, trail points and javascript events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// An error captured while the request was executing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditError {
    pub id: i64,
    pub entry_id: i64,
    pub created: DateTime<Utc>,
    pub message: String,
    pub code: i64,
    pub file: Option<String>,
    pub line: Option<u32>,
    /// Groups identical errors across entries
    pub hash: String,
    pub trace: Option<JsonValue>,
}

/// Input for creating an [`AuditError`] row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAuditError {
    pub message: String,
    #[serde(default)]
    pub code: i64,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub trace: Option<JsonValue>,
}

impl NewAuditError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn with_trace(mut self, trace: JsonValue) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Hash of message, file and line
    pub fn compute_hash(&self) -> String {
        use sha2::{Digest, Sha256};

        let data = format!(
            "{}|{}|{}",
            self.message,
            self.file.as_deref().unwrap_or_default(),
            self.line.unwrap_or(0)
        );

        hex::encode(Sha256::digest(data.as_bytes()))
    }
}

/// One execution trail point, typically a model change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub id: i64,
    pub entry_id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub model: String,
    pub model_id: Option<String>,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub stamp: DateTime<Utc>,
}

/// Input for creating an [`AuditTrail`] row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAuditTrail {
    pub user_id: Option<i64>,
    pub action: String,
    pub model: String,
    pub model_id: Option<String>,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl NewAuditTrail {
    pub fn new(action: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Record a single field transition
    pub fn change(
        mut self,
        field: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        self.field = Some(field.into());
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }
}

/// A client-side event reported by the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditJavascript {
    pub id: i64,
    pub entry_id: i64,
    pub created: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    pub origin: Option<String>,
    pub data: Option<JsonValue>,
}

/// Input for creating an [`AuditJavascript`] row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditJavascript {
    #[serde(rename = "type", default = "default_javascript_type")]
    pub event_type: String,
    pub message: String,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub data: Option<JsonValue>,
}

fn default_javascript_type() -> String {
    "error".to_string()
}

impl NewAuditJavascript {
    pub fn new(event_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            message: message.into(),
            origin: None,
            data: None,
        }
    }
}

/// External user entity referenced by `AuditEntry::user_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}
