//! Utility functions for notification channels.

use serde_json::Value;

/// Maximum length for request/response bodies stored in notification history.
pub const MAX_BODY_LENGTH: usize = 4000;

/// Truncate a string to the specified maximum length.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated]", &s[..end])
    }
}

/// Redact sensitive fields from a JSON configuration.
///
/// Replaces values whose keys commonly carry secrets (passwords, tokens,
/// API keys, credentials), recursing into nested objects and arrays.
pub fn redact_sensitive_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                let key_lower = key.to_lowercase();
                let is_sensitive = key_lower.contains("password")
                    || key_lower.contains("passwd")
                    || key_lower.contains("pwd")
                    || key_lower.contains("token")
                    || key_lower.contains("secret")
                    || key_lower.contains("api_key")
                    || key_lower.contains("apikey")
                    || key_lower.contains("routing_key")
                    || key_lower.contains("credentials");

                if is_sensitive {
                    redacted.insert(key.clone(), Value::String("***".to_string()));
                } else if val.is_object() || val.is_array() {
                    redacted.insert(key.clone(), redact_sensitive_json(val));
                } else {
                    redacted.insert(key.clone(), val.clone());
                }
            }
            Value::Object(redacted)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(redact_sensitive_json).collect()),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_string_caps_length() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 5), "hello... [truncated]");
    }

    #[test]
    fn truncate_string_respects_char_boundaries() {
        // 3-byte characters; cutting at 4 bytes must back up to a boundary
        let s = "日本語テスト";
        let out = truncate_string(s, 4);
        assert!(out.starts_with('日'));
        assert!(out.ends_with("[truncated]"));
    }

    #[test]
    fn redacts_sensitive_fields_recursively() {
        let json = serde_json::json!({
            "username": "ops",
            "smtp_password": "secret123",
            "api_key": "abc123",
            "smtp_host": "mail.example.com",
            "nested": {
                "access_token": "xyz789",
                "public_value": "visible"
            }
        });

        let redacted = redact_sensitive_json(&json);
        assert_eq!(redacted["username"], "ops");
        assert_eq!(redacted["smtp_password"], "***");
        assert_eq!(redacted["api_key"], "***");
        assert_eq!(redacted["smtp_host"], "mail.example.com");
        assert_eq!(redacted["nested"]["access_token"], "***");
        assert_eq!(redacted["nested"]["public_value"], "visible");
    }
}
