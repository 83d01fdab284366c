//! Explicit snapshots of the ambient request state
//!
//! Front ends (the HTTP middleware, the `exec` command) build a
//! [`CaptureContext`] when execution begins and a [`ResponseContext`] when
//! it ends. The recorder never reads process-wide request state itself.

use http::HeaderMap;
use serde_json::{Map, Value as JsonValue};

use crate::compact::compact;
use crate::types::{DataType, ANONYMOUS_USER_ID};

/// JSON object holding one captured input collection
pub type ValueMap = Map<String, JsonValue>;

/// Who is making the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserIdentity {
    #[default]
    Guest,
    Authenticated(i64),
}

impl UserIdentity {
    /// The id stored on the entry; guests are recorded as 0
    pub fn audit_id(&self) -> i64 {
        match self {
            Self::Guest => ANONYMOUS_USER_ID,
            Self::Authenticated(id) => *id,
        }
    }
}

/// State of an incoming HTTP request
#[derive(Debug, Clone, Default)]
pub struct WebRequest {
    /// Path and query string as requested
    pub url: String,
    pub ip: Option<String>,
    pub referrer: Option<String>,
    /// Method from the raw server environment
    pub method: String,
    pub user: UserIdentity,
    pub query: ValueMap,
    pub post: ValueMap,
    pub cookies: ValueMap,
    /// CGI-style server variables
    pub server: ValueMap,
    pub files: ValueMap,
    pub session: ValueMap,
    pub headers: HeaderMap,
}

/// State of a command-line invocation
#[derive(Debug, Clone, Default)]
pub struct ConsoleRequest {
    pub script_file: String,
    pub params: Vec<String>,
    /// Environment variables, captured when non-empty
    pub env: ValueMap,
}

/// The kind of execution being recorded
#[derive(Debug, Clone, Default)]
pub enum RequestKind {
    Web(WebRequest),
    Console(ConsoleRequest),
    #[default]
    Unknown,
}

/// Everything the recorder reads when an execution begins
#[derive(Debug, Clone, Default)]
pub struct CaptureContext {
    /// When the host started handling the execution, in epoch seconds
    pub started_at: f64,
    /// Resolved action identifier, if routing already happened
    pub route: Option<String>,
    pub request: RequestKind,
}

impl CaptureContext {
    pub fn new(started_at: f64, request: RequestKind) -> Self {
        Self {
            started_at,
            route: None,
            request,
        }
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// The input collections to store as extra data, in write order
    pub fn captures(&self) -> Vec<Capture> {
        match &self.request {
            RequestKind::Web(web) => {
                let mut plan = vec![
                    Capture::object(DataType::Get, "$_GET", &web.query),
                    Capture::object(DataType::Post, "$_POST", &web.post),
                    Capture::object(DataType::Cookies, "$_COOKIE", &web.cookies),
                    Capture::object(DataType::Env, "$_SERVER", &web.server),
                    Capture::object(DataType::Files, "$_FILES", &web.files),
                ];
                if !web.session.is_empty() {
                    plan.push(Capture::object(DataType::Session, "$_SESSION", &web.session));
                }
                plan.push(Capture {
                    data_type: DataType::RequestHeaders,
                    name: "Request Headers",
                    data: compact(&web.headers, true),
                });
                plan
            },
            RequestKind::Console(console) => {
                let mut plan = vec![Capture {
                    data_type: DataType::Params,
                    name: "Params",
                    data: JsonValue::Array(
                        console
                            .params
                            .iter()
                            .cloned()
                            .map(JsonValue::String)
                            .collect(),
                    ),
                }];
                if !console.env.is_empty() {
                    plan.push(Capture::object(DataType::Env, "$_SERVER", &console.env));
                }
                plan
            },
            RequestKind::Unknown => Vec::new(),
        }
    }
}

/// One scheduled extra-data write
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub data_type: DataType,
    /// Display label, distinct from the machine tag
    pub name: &'static str,
    pub data: JsonValue,
}

impl Capture {
    fn object(data_type: DataType, name: &'static str, values: &ValueMap) -> Self {
        Self {
            data_type,
            name,
            data: JsonValue::Object(values.clone()),
        }
    }
}

/// State of the outgoing response
#[derive(Debug, Clone, Default)]
pub struct ResponseContext {
    pub status: Option<u16>,
    pub headers: HeaderMap,
}

impl ResponseContext {
    pub fn new(headers: HeaderMap) -> Self {
        Self {
            status: None,
            headers,
        }
    }

    /// Redirect target taken from the `Location` header
    pub fn location(&self) -> Option<String> {
        self.headers
            .get(http::header::LOCATION)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
    }
}
