//! Error classification: turns a raised [`ServiceError`] plus a declarative
//! [`ErrorResolution`] into a status, a client envelope and a log severity.
//!
//! Classification is pure. It performs no I/O and never fails; every input
//! maps to exactly one [`Classification`] whose outcome is either a warning
//! or an error, never both and never neither.
use std::collections::BTreeMap;

use axum::http::StatusCode;
use thiserror::Error;

use crate::core::{
    context::{ErrorReport, Outcome, RequestLogger},
    envelope::ErrorEnvelope,
};

/// Warning text recorded for structured validation failures.
pub const VALIDATION_WARNING: &str = "Struct validation failure";

/// One invalid input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Path segments to the field, joined with `.` in the response.
    pub path: Vec<String>,
    /// Human-readable reason. Preferred over the type message when present.
    pub reason: Option<String>,
    /// The type the field was expected to have, e.g. `number`.
    pub expected: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            path: vec![field.into()],
            reason: None,
            expected: expected.into(),
        }
    }

    /// Build an issue for a nested field such as `address.zip`.
    pub fn at_path<I, S>(path: I, expected: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            reason: None,
            expected: expected.into(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn field_name(&self) -> String {
        self.path.join(".")
    }

    pub fn message(&self) -> String {
        match &self.reason {
            Some(reason) => reason.clone(),
            None => format!("must be a {}", self.expected),
        }
    }
}

/// An error a route handler hands to the classifier.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    /// A domain failure carrying a stable discriminant.
    #[error("{message}")]
    Domain { code: String, message: String },

    /// The client sent malformed or missing fields.
    #[error("validation failed for {} field(s)", issues.len())]
    Validation { issues: Vec<FieldIssue> },

    /// Any other error, with no discriminant.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ServiceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Domain {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn validation(issues: Vec<FieldIssue>) -> Self {
        Self::Validation { issues }
    }

    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(err))
    }

    /// The dispatch key used for rule lookup.
    pub fn discriminant(&self) -> Option<&str> {
        match self {
            ServiceError::Domain { code, .. } => Some(code),
            _ => None,
        }
    }

    fn report(&self) -> ErrorReport {
        ErrorReport::from_error(self, self.discriminant())
    }
}

/// Direct outcome for callers that already know the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSpec {
    pub message: String,
    pub status: StatusCode,
    pub code: Option<String>,
}

impl MessageSpec {
    /// A 500 with the given message and no code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: None,
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Fully specified rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub status: StatusCode,
    pub message: Option<String>,
    pub code_override: Option<String>,
    pub is_error: bool,
}

impl RuleSpec {
    /// A warning-severity rule answering with `status`.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            message: None,
            code_override: None,
            is_error: false,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code_override = Some(code.into());
        self
    }

    /// Record matches at error severity regardless of status.
    pub fn error(mut self) -> Self {
        self.is_error = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleEntry {
    /// Severity follows the status: 5xx is an error, anything else a warning.
    StatusOnly(StatusCode),
    FullSpec(RuleSpec),
    /// A 500 error answered with this message and no code.
    MessageOnly(String),
}

/// Ordered discriminant → rule mapping with an optional fallback rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<(String, RuleEntry)>,
    fallback: Option<RuleEntry>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a discriminant to a bare status.
    pub fn status(self, discriminant: impl Into<String>, status: StatusCode) -> Self {
        self.entry(discriminant, RuleEntry::StatusOnly(status))
    }

    /// Map a discriminant to a full rule.
    pub fn rule(self, discriminant: impl Into<String>, spec: RuleSpec) -> Self {
        self.entry(discriminant, RuleEntry::FullSpec(spec))
    }

    pub fn entry(mut self, discriminant: impl Into<String>, entry: RuleEntry) -> Self {
        self.rules.push((discriminant.into(), entry));
        self
    }

    /// Message answered with a 500 when no discriminant matches.
    pub fn fallback(self, message: impl Into<String>) -> Self {
        self.fallback_entry(RuleEntry::MessageOnly(message.into()))
    }

    /// Rule applied when no discriminant matches.
    pub fn fallback_rule(self, spec: RuleSpec) -> Self {
        self.fallback_entry(RuleEntry::FullSpec(spec))
    }

    /// Bare status applied when no discriminant matches.
    pub fn fallback_status(self, status: StatusCode) -> Self {
        self.fallback_entry(RuleEntry::StatusOnly(status))
    }

    pub fn fallback_entry(mut self, entry: RuleEntry) -> Self {
        self.fallback = Some(entry);
        self
    }

    /// First rule registered for `discriminant`.
    pub fn lookup(&self, discriminant: &str) -> Option<&RuleEntry> {
        self.rules
            .iter()
            .find(|(key, _)| key == discriminant)
            .map(|(_, entry)| entry)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.fallback.is_none()
    }
}

/// How a caller wants an error resolved. Exactly one form per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorResolution {
    DirectMessage(MessageSpec),
    RuleSet(RuleSet),
}

impl ErrorResolution {
    /// Resolve loosely supplied inputs into one variant.
    ///
    /// Passing both is a caller mistake: it is logged and the direct message
    /// wins. Passing neither gives an empty rule set, which escalates.
    pub fn resolve(
        message: Option<MessageSpec>,
        rules: Option<RuleSet>,
        log: Option<&RequestLogger>,
    ) -> Self {
        match (message, rules) {
            (Some(message), Some(rules)) => {
                let meta = serde_json::json!({
                    "msg": message.message,
                    "options": rules.rules.iter().map(|(key, _)| key).collect::<Vec<_>>(),
                });
                match log {
                    Some(log) => log.warn(
                        Some(meta),
                        "Incorrectly passing both msg and options to handle_error",
                    ),
                    None => tracing::warn!(
                        %meta,
                        "Incorrectly passing both msg and options to handle_error"
                    ),
                }
                Self::DirectMessage(message)
            }
            (Some(message), None) => Self::DirectMessage(message),
            (None, Some(rules)) => Self::RuleSet(rules),
            (None, None) => Self::RuleSet(RuleSet::new()),
        }
    }
}

impl From<MessageSpec> for ErrorResolution {
    fn from(spec: MessageSpec) -> Self {
        Self::DirectMessage(spec)
    }
}

impl From<RuleSet> for ErrorResolution {
    fn from(rules: RuleSet) -> Self {
        Self::RuleSet(rules)
    }
}

impl From<&str> for ErrorResolution {
    fn from(message: &str) -> Self {
        Self::DirectMessage(MessageSpec::new(message))
    }
}

/// The decision for one error: what the client sees and how it is logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: StatusCode,
    pub envelope: ErrorEnvelope,
    pub outcome: Outcome,
}

/// Classify `error` according to `resolution`.
pub fn classify(error: &ServiceError, resolution: &ErrorResolution) -> Classification {
    if let ServiceError::Validation { issues } = error {
        return classify_validation(issues);
    }

    match resolution {
        ErrorResolution::DirectMessage(spec) => Classification {
            status: spec.status,
            envelope: ErrorEnvelope::with_code(spec.message.clone(), spec.code.clone()),
            outcome: Outcome::Error(error.report()),
        },
        ErrorResolution::RuleSet(rules) => classify_with_rules(error, rules),
    }
}

fn classify_validation(issues: &[FieldIssue]) -> Classification {
    let fields: BTreeMap<String, String> = issues
        .iter()
        .map(|issue| (issue.field_name(), issue.message()))
        .collect();

    Classification {
        status: StatusCode::BAD_REQUEST,
        envelope: ErrorEnvelope::validation(fields),
        outcome: Outcome::Warning(VALIDATION_WARNING.to_string()),
    }
}

fn classify_with_rules(error: &ServiceError, rules: &RuleSet) -> Classification {
    let discriminant = error.discriminant();

    match discriminant
        .and_then(|d| rules.lookup(d))
        .or(rules.fallback.as_ref())
    {
        Some(entry) => apply_rule(error, entry),
        None => Classification {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            envelope: ErrorEnvelope::generic(),
            outcome: Outcome::Error(error.report().with_note(format!(
                "unhandled error discriminant '{}': no matching rule and no fallback",
                discriminant.unwrap_or("<none>")
            ))),
        },
    }
}

/// Apply a matched rule, or the fallback, to `error`.
fn apply_rule(error: &ServiceError, entry: &RuleEntry) -> Classification {
    let message = error.to_string();
    let discriminant = error.discriminant().map(str::to_string);

    match entry {
        RuleEntry::StatusOnly(status) => {
            let outcome = if status.is_server_error() {
                Outcome::Error(error.report())
            } else {
                Outcome::Warning(message.clone())
            };
            Classification {
                status: *status,
                envelope: ErrorEnvelope::with_code(message, discriminant),
                outcome,
            }
        }
        RuleEntry::FullSpec(spec) => {
            let message = spec.message.clone().unwrap_or(message);
            let code = spec.code_override.clone().or(discriminant);
            let outcome = if spec.is_error {
                Outcome::Error(error.report())
            } else {
                Outcome::Warning(message.clone())
            };
            Classification {
                status: spec.status,
                envelope: ErrorEnvelope::with_code(message, code),
                outcome,
            }
        }
        RuleEntry::MessageOnly(text) => Classification {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            envelope: ErrorEnvelope::message(text.clone()),
            outcome: Outcome::Error(error.report()),
        },
    }
}
