//! Resolved configuration values.

use dnsexit_common::MASK;
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::keys::ConfigKey;
use crate::source::ConfigSource;

/// A setting value together with its origin.
///
/// Both `Display` and `Debug` mask the value when the key is sensitive, so a
/// `ResolvedValue` can be dropped into any log field as-is. The raw value is
/// only reachable through [`value`](Self::value).
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    key: ConfigKey,
    value: String,
    source: ConfigSource,
    sensitive: bool,
}

impl ResolvedValue {
    pub fn new(key: ConfigKey, value: impl Into<String>, source: ConfigSource) -> Self {
        let sensitive = key.is_sensitive();
        Self {
            key,
            value: value.into(),
            source,
            sensitive,
        }
    }

    pub fn key(&self) -> &ConfigKey {
        &self.key
    }

    /// Raw value. Never log this directly.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn into_value(self) -> String {
        self.value
    }

    pub fn source(&self) -> ConfigSource {
        self.source
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// Value as it may appear in output.
    pub fn display_value(&self) -> Cow<'_, str> {
        if self.sensitive {
            Cow::Borrowed(MASK)
        } else {
            Cow::Borrowed(&self.value)
        }
    }

    pub fn as_u64(&self) -> ConfigResult<u64> {
        self.value
            .trim()
            .parse()
            .map_err(|_| self.invalid("a non-negative integer"))
    }

    pub fn as_u32(&self) -> ConfigResult<u32> {
        self.value
            .trim()
            .parse()
            .map_err(|_| self.invalid("a non-negative integer"))
    }

    /// Whole seconds as a `Duration`.
    pub fn as_secs(&self) -> ConfigResult<Duration> {
        self.value
            .trim()
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| self.invalid("a number of seconds"))
    }

    pub fn as_bool(&self) -> ConfigResult<bool> {
        match self.value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(self.invalid("a boolean")),
        }
    }

    fn invalid(&self, expected: &'static str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.key.to_string(),
            shown: self.display_value().into_owned(),
            expected,
        }
    }
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={} (from {})",
            self.key,
            self.display_value(),
            self.source
        )
    }
}

impl fmt::Debug for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedValue")
            .field("key", &self.key.as_str())
            .field("value", &self.display_value())
            .field("source", &self.source)
            .field("sensitive", &self.sensitive)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;
    use proptest::prelude::*;

    fn value(key: &str, raw: &str) -> ResolvedValue {
        ResolvedValue::new(ConfigKey::new(key), raw, ConfigSource::DirectValue)
    }

    #[test]
    fn test_sensitive_value_is_masked_everywhere() {
        let v = value(keys::DNSEXIT_API_KEY, "abc123");
        assert!(v.is_sensitive());
        assert_eq!(v.value(), "abc123");

        let display = v.to_string();
        assert_eq!(display, "dnsexit_api_key=***MASKED*** (from environment)");
        assert!(!format!("{:?}", v).contains("abc123"));
        assert!(!format!("loaded setting {} ok", v).contains("abc123"));
    }

    #[test]
    fn test_plain_value_is_shown() {
        let v = value(keys::DNS_PROPAGATION_WAIT, "120");
        assert!(!v.is_sensitive());
        assert_eq!(v.to_string(), "dns_propagation_wait=120 (from environment)");
    }

    #[test]
    fn test_numeric_coercions() {
        assert_eq!(value(keys::DNS_PROPAGATION_WAIT, " 300 ").as_u64().unwrap(), 300);
        assert_eq!(
            value(keys::DNS_FINALIZATION_WAIT, "5").as_secs().unwrap(),
            Duration::from_secs(5)
        );
        assert_eq!(value(keys::DNSEXIT_API_MAX_ATTEMPTS, "3").as_u32().unwrap(), 3);

        let err = value(keys::DNS_PROPAGATION_WAIT, "five minutes")
            .as_secs()
            .unwrap_err();
        assert!(err.to_string().contains("five minutes"));
    }

    #[test]
    fn test_invalid_sensitive_value_is_not_echoed() {
        let err = value("webhook_token", "not-a-number").as_u64().unwrap_err();
        let message = err.to_string();
        assert!(!message.contains("not-a-number"));
        assert!(message.contains(MASK));
    }

    #[test]
    fn test_bool_coercion() {
        assert!(value("flag", "Yes").as_bool().unwrap());
        assert!(!value("flag", "0").as_bool().unwrap());
        assert!(value("flag", "maybe").as_bool().is_err());
    }

    proptest! {
        #[test]
        fn rendered_sensitive_value_never_contains_secret(secret in "[A-Za-z0-9_-]{1,64}") {
            // Skip secrets that are part of the fixed rendering around the mask
            let blank = value(keys::DNSEXIT_API_KEY, "\u{1}");
            let frame = format!("{} {:?}", blank, blank);
            prop_assume!(!frame.contains(&secret));

            let v = value(keys::DNSEXIT_API_KEY, &secret);
            let shown = v.to_string();
            let debugged = format!("{:?}", v);
            prop_assert!(!shown.contains(&secret));
            prop_assert!(!debugged.contains(&secret));
        }
    }
}
