//! Secret masking.
//!
//! A setting or JSON field is sensitive when its name contains one of
//! [`SENSITIVE_MARKERS`] (case-insensitive). Sensitive values are replaced
//! by [`MASK`] wherever they would otherwise be rendered.

use serde_json::Value;
use std::borrow::Cow;

/// Placeholder substituted for sensitive values.
pub const MASK: &str = "***MASKED***";

/// Name fragments that mark a setting as sensitive.
pub const SENSITIVE_MARKERS: &[&str] = &["key", "secret", "password", "token", "auth"];

/// Returns true if `name` contains any sensitive marker.
pub fn is_sensitive_key(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Returns [`MASK`] when `key` is sensitive, the value untouched otherwise.
pub fn mask_if_sensitive<'a>(key: &str, value: &'a str) -> Cow<'a, str> {
    if is_sensitive_key(key) {
        Cow::Borrowed(MASK)
    } else {
        Cow::Borrowed(value)
    }
}

/// Returns a copy of `value` with every field under a sensitive name masked.
///
/// Objects and arrays are walked recursively. A sensitive field is masked as
/// a whole, whatever its shape; `null` is left alone.
pub fn mask_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(name, field)| {
                    let masked = if is_sensitive_key(name) && !field.is_null() {
                        Value::String(MASK.to_string())
                    } else {
                        mask_json(field)
                    };
                    (name.clone(), masked)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(mask_json).collect()),
        other => other.clone(),
    }
}

/// Scrubs known secret values out of free-form text.
///
/// Used on error messages before they are logged, since a remote API or
/// library error may echo back whatever it was sent.
#[derive(Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret. Empty strings are ignored.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.add(secret);
        self
    }

    pub fn add(&mut self, secret: impl Into<String>) {
        let secret = secret.into();
        if secret.is_empty() || self.secrets.contains(&secret) {
            return;
        }
        self.secrets.push(secret);
        // Longest first so a secret containing another is replaced whole
        self.secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
    }

    pub fn redact(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), MASK))
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl std::fmt::Debug for Redactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redactor")
            .field("secrets", &self.secrets.len())
            .finish()
    }
}
