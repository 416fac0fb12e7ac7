//! Body sanitising applied before anything is written to the audit log.
use serde_json::Value;

/// Replacement written in place of sensitive values.
pub const REDACTION_MARKER: &str = "*******";

/// Top-level keys whose values never reach the log.
pub const SENSITIVE_FIELDS: [&str; 3] = ["password", "token", "secret"];

/// Replace the value of every top-level sensitive key, whatever its type.
///
/// Only objects are inspected, and only one level deep.
pub fn redact(mut body: Value) -> Value {
    if let Value::Object(map) = &mut body {
        for key in SENSITIVE_FIELDS {
            if let Some(value) = map.get_mut(key) {
                *value = Value::String(REDACTION_MARKER.to_string());
            }
        }
    }
    body
}

/// Bound a body's serialized length.
///
/// `None` keeps the body as is, `Some(0)` logs nothing, and `Some(n)` keeps the
/// first `n` characters of the serialized text followed by a note of how many
/// were cut. Lengths count characters, not bytes.
pub fn truncate(body: Value, max_len: Option<usize>) -> Value {
    let Some(max_len) = max_len else {
        return body;
    };
    if max_len == 0 {
        return Value::String(String::new());
    }

    let serialized = match &body {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let total = serialized.chars().count();
    if total <= max_len {
        return body;
    }

    let kept: String = serialized.chars().take(max_len).collect();
    Value::String(format!("{kept}...[truncated {} chars]", total - max_len))
}

/// Redact, then truncate.
pub fn sanitize(body: Value, max_len: Option<usize>) -> Value {
    truncate(redact(body), max_len)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_redacts_any_value_type() {
        let body = json!({
            "password": "secret123",
            "token": { "nested": true },
            "secret": 42,
            "name": "Al"
        });
        assert_eq!(
            redact(body),
            json!({
                "password": "*******",
                "token": "*******",
                "secret": "*******",
                "name": "Al"
            })
        );
    }

    #[test]
    fn test_redaction_is_shallow() {
        let body = json!({ "user": { "password": "hunter2" } });
        assert_eq!(redact(body.clone()), body);
    }

    #[test]
    fn test_redaction_ignores_non_objects() {
        assert_eq!(redact(json!(["password"])), json!(["password"]));
        assert_eq!(redact(json!("password")), json!("password"));
    }

    #[test]
    fn test_zero_limit_logs_nothing() {
        assert_eq!(truncate(json!({ "a": 1 }), Some(0)), json!(""));
    }

    #[test]
    fn test_unset_or_large_limit_is_verbatim() {
        let body = json!({ "a": 1 });
        assert_eq!(truncate(body.clone(), None), body);
        // {"a":1} is 7 characters.
        assert_eq!(truncate(body.clone(), Some(7)), body);
    }

    #[test]
    fn test_long_body_is_cut_with_count() {
        let body = json!({ "name": "abcdefghij" });
        let serialized = body.to_string();
        let total = serialized.chars().count();

        let logged = truncate(body, Some(5));
        let expected = format!("{}...[truncated {} chars]", &serialized[..5], total - 5);
        assert_eq!(logged, Value::String(expected));
    }

    #[test]
    fn test_truncation_counts_characters() {
        let logged = truncate(json!("héllo wörld"), Some(4));
        assert_eq!(logged, json!("héll...[truncated 7 chars]"));
    }

    #[test]
    fn test_sanitize_redacts_before_measuring() {
        let body = json!({ "password": "a-very-long-password-value" });
        // {"password":"*******"} is 22 characters.
        assert_eq!(
            sanitize(body, Some(22)),
            json!({ "password": "*******" })
        );
    }
}
