//! Responses for requests nothing else answered: unmatched routes and panics.
use std::any::Any;

use axum::http::StatusCode;

use crate::core::{
    classifier::Classification,
    context::{ErrorReport, Outcome},
    envelope::ErrorEnvelope,
};

/// Message logged when the safety net catches a panic.
pub const CRASH_LOG_MESSAGE: &str = "Something broke that wasn't handled anywhere else";

/// A 404 with no body means no route claimed the request.
pub fn is_unclaimed(status: StatusCode, body_is_empty: bool) -> bool {
    status == StatusCode::NOT_FOUND && body_is_empty
}

/// Classify an unmatched request as a 404 warning naming the method and path.
///
/// Returns `None` when the response was already claimed, so applying it twice
/// changes nothing.
pub fn unknown_route(
    method: &str,
    path: &str,
    status: StatusCode,
    body_is_empty: bool,
) -> Option<Classification> {
    if !is_unclaimed(status, body_is_empty) {
        return None;
    }

    let warning = format!("Unknown endpoint requested: {method} {path}");
    Some(Classification {
        status: StatusCode::NOT_FOUND,
        envelope: ErrorEnvelope::message(warning.clone()),
        outcome: Outcome::Warning(warning),
    })
}

/// Classify a caught panic. The payload is kept for the log only.
pub fn crash(payload: &(dyn Any + Send)) -> Classification {
    let message = panic_message(payload);
    Classification {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        envelope: ErrorEnvelope::generic(),
        outcome: Outcome::Error(ErrorReport {
            detail: format!("panic: {message}"),
            message,
            code: None,
            note: None,
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::envelope::GENERIC_ERROR_MESSAGE;

    #[test]
    fn test_unknown_route_names_method_and_path() {
        let result = unknown_route("GET", "/nope", StatusCode::NOT_FOUND, true).unwrap();
        assert_eq!(result.status, StatusCode::NOT_FOUND);
        assert_eq!(
            result.envelope.to_json(),
            json!({ "error": { "message": "Unknown endpoint requested: GET /nope" } })
        );
        assert_eq!(
            result.outcome.warning(),
            Some("Unknown endpoint requested: GET /nope")
        );
    }

    #[test]
    fn test_claimed_responses_are_left_alone() {
        assert!(unknown_route("GET", "/x", StatusCode::NOT_FOUND, false).is_none());
        assert!(unknown_route("GET", "/x", StatusCode::OK, true).is_none());
    }

    #[test]
    fn test_crash_hides_panic_text_from_client() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("index out of bounds"));
        let result = crash(payload.as_ref());

        assert_eq!(result.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(result.envelope.error.message, GENERIC_ERROR_MESSAGE);
        assert_eq!(
            result.outcome.error().unwrap().message,
            "index out of bounds"
        );

        let opaque: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(
            crash(opaque.as_ref()).outcome.error().unwrap().message,
            "non-string panic payload"
        );
    }
}
