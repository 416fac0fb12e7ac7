//! The JSON error shape every client-facing failure is rendered as.
//!
//! Two shapes exist: the standard one carries a `message` and an optional
//! `code`, the validation one carries a `message` and a per-field `fields`
//! map. The constructors below are the only way to build an envelope, so a
//! body with both `code` and `fields` cannot be produced.
use std::collections::BTreeMap;

use serde::Serialize;

/// Generic message shown to clients when the failure is not theirs to know about.
pub const GENERIC_ERROR_MESSAGE: &str = "We encountered a problem";

/// Message used for structured validation failures.
pub const VALIDATION_ERROR_MESSAGE: &str = "Missing or incorrectly formatted data";

/// `{ "error": { ... } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<BTreeMap<String, String>>,
}

impl ErrorEnvelope {
    /// Standard envelope with only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                code: None,
                fields: None,
            },
        }
    }

    /// Standard envelope with a message and an optional machine-readable code.
    pub fn with_code(message: impl Into<String>, code: Option<String>) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                code,
                fields: None,
            },
        }
    }

    /// Validation envelope: the fixed validation message plus one entry per field.
    pub fn validation(fields: BTreeMap<String, String>) -> Self {
        Self {
            error: ErrorBody {
                message: VALIDATION_ERROR_MESSAGE.to_string(),
                code: None,
                fields: Some(fields),
            },
        }
    }

    /// The generic 500 envelope.
    pub fn generic() -> Self {
        Self::message(GENERIC_ERROR_MESSAGE)
    }

    pub fn code(&self) -> Option<&str> {
        self.error.code.as_deref()
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, String>> {
        self.error.fields.as_ref()
    }

    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({ "error": { "message": self.error.message } })
        })
    }
}
