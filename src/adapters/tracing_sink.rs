//! [`LogSink`] adapter writing through the `tracing` facade.
//!
//! The installed subscriber (see [`crate::tracing_setup`]) serialises each
//! event as one line, so concurrent requests never interleave.
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::{
    core::{audit::LogRecord, context::Severity},
    ports::log_sink::{LogSink, LogSinkResult},
};

/// Emit the audit record with a fixed set of structured fields.
macro_rules! emit_record {
    ($level:ident, $service:expr, $record:expr, $outcome:expr, $message:literal) => {
        tracing::$level!(
            target: "trellis::audit",
            service = %$service,
            id = %$record.id,
            method = %$record.method,
            url = %$record.url,
            ip = $record.ip.as_deref().unwrap_or("-"),
            request_body = %$record.request_body,
            response_status = $record.response_status,
            response_body = %$record.response_body,
            response_time_ms = $record.response_time_ms,
            outcome = %$outcome,
            $message
        )
    };
}

#[derive(Debug, Clone)]
pub struct TracingSink {
    service: Arc<str>,
}

impl TracingSink {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: Arc::from(service.into()),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

impl LogSink for TracingSink {
    fn event(
        &self,
        severity: Severity,
        fields: &Map<String, Value>,
        message: &str,
    ) -> LogSinkResult<()> {
        let meta = Value::Object(fields.clone());
        match severity {
            Severity::Info => {
                tracing::info!(target: "trellis::request", service = %self.service, meta = %meta, "{message}")
            }
            Severity::Warning => {
                tracing::warn!(target: "trellis::request", service = %self.service, meta = %meta, "{message}")
            }
            Severity::Error => {
                tracing::error!(target: "trellis::request", service = %self.service, meta = %meta, "{message}")
            }
        }
        Ok(())
    }

    fn request(&self, record: &LogRecord) -> LogSinkResult<()> {
        match record.severity() {
            Severity::Info => emit_record!(info, self.service, record, "-", "request completed"),
            Severity::Warning => {
                let warning = record.warning.as_deref().unwrap_or_default();
                emit_record!(warn, self.service, record, warning, "request completed with warning")
            }
            Severity::Error => {
                let err = serde_json::to_string(&record.err).unwrap_or_default();
                emit_record!(error, self.service, record, err, "request failed")
            }
        }
        Ok(())
    }
}
