//! Masking of credentials before log records leave the process.
//!
//! Values under `password` and `authorization` keys (any letter case) are
//! replaced by [`MASK`]. String values that are themselves serialized JSON,
//! such as captured request bodies, are parsed and masked recursively. Text
//! that does not parse falls back to a pattern substitution.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

pub const MASK: &str = "*****";

const SENSITIVE_KEYS: [&str; 2] = ["password", "authorization"];

/// A sensitive key and its value, in plain or backslash-escaped JSON. The value
/// is an escaped string, a plain string or a bare scalar.
static SENSITIVE_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(\\?)"(password|authorization)\\?"\s*:\s*(?:\\"[^"\\]*\\"|"(?:[^"\\]|\\.)*"|[^\s,}\]"\\]+)"#,
    )
    .unwrap()
});

fn is_sensitive(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k))
}

/// Mask every sensitive value in `value`
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, v)| {
                    if is_sensitive(&key) {
                        (key, Value::String(MASK.to_string()))
                    } else {
                        (key, sanitize(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::String(text) => Value::String(sanitize_text(&text)),
        other => other,
    }
}

/// Mask a free-form string that may carry serialized JSON
pub fn sanitize_text(text: &str) -> String {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str::<Value>(text) {
            return sanitize(parsed).to_string();
        }
    }

    if SENSITIVE_PAIR_RE.is_match(text) {
        return SENSITIVE_PAIR_RE
            .replace_all(text, format!(r#"${{1}}"${{2}}${{1}}": ${{1}}"{}${{1}}""#, MASK).as_str())
            .into_owned();
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_masks_password_field() {
        let sanitized = sanitize(json!({ "email": "d@jwt.com", "password": "secret123" }));
        assert_eq!(sanitized["password"], MASK);
        assert_eq!(sanitized["email"], "d@jwt.com");
        assert!(!sanitized.to_string().contains("secret123"));
    }

    #[test]
    fn test_masks_authorization_case_variants() {
        let sanitized = sanitize(json!({
            "authorization": "Bearer abc",
            "Authorization": "Bearer def",
            "AUTHORIZATION": "Bearer ghi",
        }));
        let text = sanitized.to_string();
        assert!(!text.contains("abc"));
        assert!(!text.contains("def"));
        assert!(!text.contains("ghi"));
    }

    #[test]
    fn test_masks_nested_and_embedded_json() {
        let payload = json!({
            "authorized": true,
            "reqBody": r#"{"name":"pizza diner","password":"secret123"}"#,
            "items": [{ "headers": { "Authorization": "Bearer tttttt" } }],
        });
        let sanitized = sanitize(payload);
        let text = sanitized.to_string();

        assert!(!text.contains("secret123"));
        assert!(!text.contains("tttttt"));
        assert_eq!(sanitized["authorized"], true);

        let req_body: Value = serde_json::from_str(sanitized["reqBody"].as_str().unwrap()).unwrap();
        assert_eq!(req_body["password"], MASK);
        assert_eq!(req_body["name"], "pizza diner");
    }

    #[test]
    fn test_fallback_on_unparseable_text() {
        let text = r#"partial {"password": "secret123", "x": 1"#;
        let sanitized = sanitize_text(text);
        assert!(!sanitized.contains("secret123"));
        assert!(sanitized.contains(MASK));
    }

    #[test]
    fn test_fallback_on_escaped_json() {
        let text = r#"call failed: {\"email\":\"d@jwt.com\",\"password\":\"secret123\""#;
        let sanitized = sanitize_text(text);
        assert!(!sanitized.contains("secret123"));
        assert!(sanitized.contains(r#"\"password\": \"*****\""#));
        assert!(sanitized.contains(r#"\"email\":\"d@jwt.com\""#));
    }

    #[test]
    fn test_fallback_on_non_string_values() {
        let sanitized = sanitize_text(r#"truncated {"password": 123456, "Authorization": null, "x""#);
        assert!(!sanitized.contains("123456"));
        assert!(!sanitized.contains("null"));
        assert!(sanitized.contains(r#""password": "*****""#));
        assert!(sanitized.contains(r#""x""#));
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(sanitize_text("SELECT 1"), "SELECT 1");
        assert_eq!(sanitize(json!(42)), json!(42));
    }
}
