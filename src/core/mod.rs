pub mod audit;
pub mod classifier;
pub mod context;
pub mod envelope;
pub mod fallback;
pub mod redaction;

pub use audit::{BodyLimits, LogRecord};
pub use classifier::{
    Classification, ErrorResolution, FieldIssue, MessageSpec, RuleEntry, RuleSet, RuleSpec,
    ServiceError, classify,
};
pub use context::{ErrorReport, Outcome, RequestContext, RequestId, RequestLogger, Severity};
pub use envelope::ErrorEnvelope;
