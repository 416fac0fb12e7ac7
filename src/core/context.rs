//! Per-request state shared between the tracking, classification and audit stages.
//!
//! Each field has exactly one writer:
//! - the tracker writes `id` and `start`,
//! - the audit logger installs `log`,
//! - the classifier (or the safety net / unknown-route stage) produces the
//!   [`Outcome`], which travels back up the chain attached to the response.
//!
//! The audit logger is the only reader of all of them, once, at completion.
use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::ports::log_sink::LogSink;

/// Correlation id for one request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// Generate a fresh random id (UUID v4).
    pub fn new() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    pub fn from_string<S: Into<String>>(id: S) -> Self {
        Self(Arc::from(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Log severity of a finished request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// What gets recorded for an error-severity request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Debug rendering of the raw error. Never sent to clients.
    pub detail: String,
    /// Set when the error reached the classifier without a rule to handle it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ErrorReport {
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E, code: Option<&str>) -> Self {
        Self {
            message: err.to_string(),
            code: code.map(str::to_string),
            detail: format!("{err:?}"),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Terminal classification of a request. Error and warning are exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Outcome {
    #[default]
    Info,
    Warning(String),
    Error(ErrorReport),
}

impl Outcome {
    pub fn severity(&self) -> Severity {
        match self {
            Outcome::Info => Severity::Info,
            Outcome::Warning(_) => Severity::Warning,
            Outcome::Error(_) => Severity::Error,
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            Outcome::Warning(text) => Some(text),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorReport> {
        match self {
            Outcome::Error(report) => Some(report),
            _ => None,
        }
    }
}

/// Logger bound to one request's correlation id.
///
/// Every line it writes carries `id`, so downstream code never has to thread
/// the id through by hand.
#[derive(Clone)]
pub struct RequestLogger {
    id: RequestId,
    sink: Arc<dyn LogSink>,
}

impl RequestLogger {
    pub fn new(id: RequestId, sink: Arc<dyn LogSink>) -> Self {
        Self { id, sink }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn info(&self, meta: Option<Value>, message: &str) {
        self.emit(Severity::Info, meta, message);
    }

    pub fn warn(&self, meta: Option<Value>, message: &str) {
        self.emit(Severity::Warning, meta, message);
    }

    pub fn error(&self, meta: Option<Value>, message: &str) {
        self.emit(Severity::Error, meta, message);
    }

    fn emit(&self, severity: Severity, meta: Option<Value>, message: &str) {
        let mut fields = match meta {
            Some(Value::Object(map)) => map,
            Some(other) => {
                let mut map = Map::new();
                map.insert("meta".to_string(), other);
                map
            }
            None => Map::new(),
        };
        fields.insert("id".to_string(), Value::String(self.id.to_string()));

        if let Err(e) = self.sink.event(severity, &fields, message) {
            tracing::warn!(request_id = %self.id, "Failed to write request log line: {}", e);
        }
    }
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger").field("id", &self.id).finish()
    }
}

/// Request-scoped tracking data plus the correlated logger once installed.
#[derive(Clone, Debug)]
pub struct RequestContext {
    id: RequestId,
    start: Instant,
    log: Option<RequestLogger>,
}

impl RequestContext {
    /// Stamp a new request with a fresh id and the current instant.
    pub fn track() -> Self {
        Self {
            id: RequestId::new(),
            start: Instant::now(),
            log: None,
        }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    /// Elapsed time since tracking began. Monotonic, never negative.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn install_logger(&mut self, sink: Arc<dyn LogSink>) -> RequestLogger {
        let logger = RequestLogger::new(self.id.clone(), sink);
        self.log = Some(logger.clone());
        logger
    }

    pub fn log(&self) -> Option<&RequestLogger> {
        self.log.as_ref()
    }
}
