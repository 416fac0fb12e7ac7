use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::{audit::LogRecord, context::Severity};

/// Error type for log sink operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LogSinkError {
    /// The sink's storage could not be written
    #[error("Log sink unavailable: {0}")]
    Unavailable(String),
}

/// Result type for log sink operations
pub type LogSinkResult<T> = Result<T, LogSinkError>;

/// LogSink defines the port (interface) the middleware writes log lines to
///
/// One instance is shared by every in-flight request, so implementations must
/// accept concurrent writes without interleaving lines.
pub trait LogSink: Send + Sync + 'static {
    /// Write a free-form line from a request's correlated logger
    ///
    /// # Arguments
    /// * `severity` - Level of the line
    /// * `fields` - Structured metadata, always including the correlation `id`
    /// * `message` - Human-readable message
    fn event(&self, severity: Severity, fields: &Map<String, Value>, message: &str)
    -> LogSinkResult<()>;

    /// Write the single audit record produced when a request completes
    fn request(&self, record: &LogRecord) -> LogSinkResult<()>;
}
