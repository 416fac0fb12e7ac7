//! The audit record written once per request.
use serde::Serialize;
use serde_json::Value;

use crate::core::{
    context::{ErrorReport, Outcome, RequestContext, Severity},
    redaction::sanitize,
};

/// Per-body logging limits, in serialized characters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BodyLimits {
    pub request: Option<usize>,
    pub response: Option<usize>,
}

/// One structured line describing a finished request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub id: String,
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub request_body: Value,
    pub response_status: u16,
    pub response_body: Value,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<ErrorReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl LogRecord {
    /// Error beats warning beats info.
    pub fn severity(&self) -> Severity {
        if self.err.is_some() {
            Severity::Error
        } else if self.warning.is_some() {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

/// Everything observed about a request once the chain has returned.
#[derive(Debug)]
pub struct CompletedRequest<'a> {
    pub context: &'a RequestContext,
    pub method: &'a str,
    pub url: &'a str,
    pub ip: Option<String>,
    pub request_body: Value,
    pub response_status: u16,
    pub response_body: Value,
    pub outcome: Outcome,
}

/// Build the audit record, sanitising both bodies.
pub fn build_record(done: CompletedRequest<'_>, limits: BodyLimits) -> LogRecord {
    let response_time_ms = u64::try_from(done.context.elapsed().as_millis()).unwrap_or(u64::MAX);
    let (err, warning) = match done.outcome {
        Outcome::Info => (None, None),
        Outcome::Warning(text) => (None, Some(text)),
        Outcome::Error(report) => (Some(report), None),
    };

    LogRecord {
        id: done.context.id().to_string(),
        method: done.method.to_string(),
        url: done.url.to_string(),
        ip: done.ip,
        request_body: sanitize(done.request_body, limits.request),
        response_status: done.response_status,
        response_body: sanitize(done.response_body, limits.response),
        response_time_ms,
        err,
        warning,
    }
}

/// A CORS pre-flight answered with an empty success (204, or the 200 some
/// CORS layers use) is not worth a line.
pub fn is_silent_preflight(
    method: &str,
    requests_cors_method: bool,
    status: u16,
    body_is_empty: bool,
) -> bool {
    method.eq_ignore_ascii_case("OPTIONS")
        && requests_cors_method
        && (200..300).contains(&status)
        && body_is_empty
}
