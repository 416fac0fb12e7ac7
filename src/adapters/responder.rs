//! Glue between the classifier and axum: turning classifications into
//! responses, and exposing the request context to handlers as extractors.
//!
//! The outcome of a classification rides back up the middleware chain as a
//! response extension, where the audit logger picks it up.
use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};

use crate::core::{
    classifier::{Classification, ErrorResolution, ServiceError, classify},
    context::{ErrorReport, Outcome, RequestContext, RequestLogger},
    envelope::ErrorEnvelope,
};

impl IntoResponse for Classification {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.envelope)).into_response();
        response.extensions_mut().insert(self.outcome);
        response
    }
}

/// A bare `ServiceError` has no rules attached: validation failures still map
/// to 400, anything else escalates to a 500 with a diagnostic note.
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        classify(&self, &ErrorResolution::RuleSet(Default::default())).into_response()
    }
}

/// Classify `err` and build the response for it.
///
/// ```rust
/// use axum::http::StatusCode;
/// use trellis::{RuleSet, RuleSpec, ServiceError, handle_error};
///
/// let err = ServiceError::new("NOT_FOUND", "Widget 7 does not exist");
/// let rules = RuleSet::new()
///     .rule("NOT_FOUND", RuleSpec::new(StatusCode::NOT_FOUND))
///     .fallback("Could not load the widget");
/// let response = handle_error(&err, rules);
/// assert_eq!(response.status(), StatusCode::NOT_FOUND);
/// ```
pub fn handle_error(err: &ServiceError, resolution: impl Into<ErrorResolution>) -> Response {
    classify(err, &resolution.into()).into_response()
}

/// Classify the error side of a `Result` in handler code.
pub trait ClassifyResultExt<T> {
    /// Map `Err` into a classified response so it can be returned with `?`.
    fn or_classify(self, resolution: impl Into<ErrorResolution>) -> Result<T, Response>;
}

impl<T> ClassifyResultExt<T> for Result<T, ServiceError> {
    fn or_classify(self, resolution: impl Into<ErrorResolution>) -> Result<T, Response> {
        self.map_err(|err| handle_error(&err, resolution))
    }
}

fn missing_context() -> Classification {
    Classification {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        envelope: ErrorEnvelope::generic(),
        outcome: Outcome::Error(ErrorReport {
            message: "request context missing".to_string(),
            code: None,
            detail: "request reached a handler without passing the tracking middleware"
                .to_string(),
            note: None,
        }),
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Classification;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(missing_context)
    }
}

impl<S> FromRequestParts<S> for RequestLogger
where
    S: Send + Sync,
{
    type Rejection = Classification;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.log().cloned())
            .ok_or_else(missing_context)
    }
}
