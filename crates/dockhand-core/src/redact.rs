//! Credential redaction for trajectories and tool surfaces.
//!
//! Detects `key=value` / `key: value` pairs whose key looks like a secret
//! name and replaces the value with `[REDACTED]` before a record leaves the
//! recorder.

use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;

/// One pattern covers both explicit env-var names and generic
/// secret-sounding identifiers. The value must be at least 3
/// non-whitespace, non-delimiter characters.
const CREDENTIAL_PATTERN: &str = concat!(
    r"(?i)(?P<key>",
    r"POSTGRES_PASSWORD|MYSQL_ROOT_PASSWORD|REDIS_PASSWORD|SECRET_KEY",
    r"|",
    r"(?:\w*(?:password|passwd|secret|token|api_key|apikey|auth|credential)\w*)",
    r")",
    r"(?P<sep>[=:])\s*",
    r#"(?P<val>[^\s,;\[\]\}\{"']{3,})"#,
);

pub struct CredentialRedactor {
    pattern: Regex,
}

impl CredentialRedactor {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(CREDENTIAL_PATTERN).expect("credential pattern compiles"),
        }
    }

    /// Redact credential values in text.
    pub fn redact<'a>(&self, text: &'a str) -> Cow<'a, str> {
        self.pattern.replace_all(text, "${key}${sep}[REDACTED]")
    }

    /// Redact credential values in a JSON tree, strings only. Keys and
    /// non-string leaves pass through unchanged.
    pub fn redact_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.redact(s).into_owned()),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.redact_value(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.redact_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Check if text contains a credential-looking pair.
    pub fn has_credentials(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

impl Default for CredentialRedactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_postgres_password_redacted() {
        let r = CredentialRedactor::new();
        let out = r.redact("POSTGRES_PASSWORD=secretpass123");
        assert_eq!(out, "POSTGRES_PASSWORD=[REDACTED]");
    }

    #[test]
    fn test_generic_password_redacted() {
        let r = CredentialRedactor::new();
        let out = r.redact("password=hunter2");
        assert!(out.contains("[REDACTED]"));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn test_api_key_redacted() {
        let r = CredentialRedactor::new();
        let out = r.redact("api_key=sk-1234567890abcdef");
        assert!(!out.contains("sk-1234567890"));
    }

    #[test]
    fn test_colon_separator_redacted() {
        let r = CredentialRedactor::new();
        let out = r.redact("token: xyz789abc");
        assert!(!out.contains("xyz789abc"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn test_non_secret_not_redacted() {
        let r = CredentialRedactor::new();
        assert_eq!(r.redact("POSTGRES_DB=cicd"), "POSTGRES_DB=cicd");
        assert_eq!(r.redact("POSTGRES_USER=admin"), "POSTGRES_USER=admin");
        assert_eq!(r.redact("no credentials here"), "no credentials here");
    }

    #[test]
    fn test_multiple_secrets_in_line() {
        let r = CredentialRedactor::new();
        let out = r.redact("SECRET_KEY=abc123def token=xyz789");
        assert!(!out.contains("abc123def"));
        assert!(!out.contains("xyz789"));
        assert_eq!(out.matches("[REDACTED]").count(), 2);
    }

    #[test]
    fn test_short_values_not_redacted() {
        let r = CredentialRedactor::new();
        assert_eq!(r.redact("password=ab"), "password=ab");
    }

    #[test]
    fn test_redaction_is_idempotent() {
        let r = CredentialRedactor::new();
        let once = r.redact("POSTGRES_PASSWORD=secretpass123").into_owned();
        let twice = r.redact(&once).into_owned();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_redact_value_recurses_strings_only() {
        let r = CredentialRedactor::new();
        let value = json!({
            "args": "-e POSTGRES_PASSWORD=s3cret123 postgres",
            "nested": {"token": "token=deadbeef99"},
            "count": 3,
        });
        let redacted = r.redact_value(&value);
        let text = redacted.to_string();
        assert!(!text.contains("s3cret123"));
        assert!(!text.contains("deadbeef99"));
        assert_eq!(redacted["count"], 3);
    }

    #[test]
    fn test_has_credentials() {
        let r = CredentialRedactor::new();
        assert!(r.has_credentials("MYSQL_ROOT_PASSWORD=rootpw1"));
        assert!(!r.has_credentials("docker ps -a"));
    }
}
