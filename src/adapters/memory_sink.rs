//! In-memory [`LogSink`] for tests and for services that assert on their own logs.
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::{
    core::{audit::LogRecord, context::Severity},
    ports::log_sink::{LogSink, LogSinkError, LogSinkResult},
};

/// A line written through a [`crate::core::RequestLogger`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedEvent {
    pub severity: Severity,
    pub fields: Map<String, Value>,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<CapturedEvent>>,
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every free-form line written so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Snapshot of every audit record written so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn event(
        &self,
        severity: Severity,
        fields: &Map<String, Value>,
        message: &str,
    ) -> LogSinkResult<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|e| LogSinkError::Unavailable(e.to_string()))?;
        events.push(CapturedEvent {
            severity,
            fields: fields.clone(),
            message: message.to_string(),
        });
        Ok(())
    }

    fn request(&self, record: &LogRecord) -> LogSinkResult<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| LogSinkError::Unavailable(e.to_string()))?;
        records.push(record.clone());
        Ok(())
    }
}
