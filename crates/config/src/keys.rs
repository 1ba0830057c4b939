//! Setting names and the registry of known settings.

use dnsexit_common::is_sensitive_key;
use std::fmt;

pub const DNSEXIT_API_KEY: &str = "dnsexit_api_key";
pub const LETSENCRYPT_EMAIL: &str = "letsencrypt_email";
pub const DNSEXIT_API_URL: &str = "dnsexit_api_url";
pub const DNSEXIT_ZONE: &str = "dnsexit_zone";
pub const DNSEXIT_RECORD_TTL: &str = "dnsexit_record_ttl";
pub const DNSEXIT_API_TIMEOUT: &str = "dnsexit_api_timeout";
pub const DNSEXIT_API_MAX_ATTEMPTS: &str = "dnsexit_api_max_attempts";
pub const DNSEXIT_API_RETRY_DELAY: &str = "dnsexit_api_retry_delay";
pub const DNS_PROPAGATION_WAIT: &str = "dns_propagation_wait";
pub const DNS_PROPAGATION_CHECK_INTERVAL: &str = "dns_propagation_check_interval";
pub const DNS_PROPAGATION_ADDRESS: &str = "dns_propagation_address";
pub const DNS_FINALIZATION_WAIT: &str = "dns_finalization_wait";
pub const DNS_QUERY_TIMEOUT: &str = "dns_query_timeout";
pub const DNS_QUERY_MAX_FAILURES: &str = "dns_query_max_failures";
pub const LOG_LEVEL: &str = "log_level";
pub const LOG_FORMAT: &str = "log_format";

/// Logical setting name.
///
/// Names are case-insensitive and stored lower-cased. The environment
/// variables derived from a key are upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigKey(String);

impl ConfigKey {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Direct value variable, e.g. `DNSEXIT_API_KEY`.
    pub fn env_name(&self) -> String {
        self.0.to_ascii_uppercase()
    }

    /// File pointer variable, e.g. `FILE__DNSEXIT_API_KEY`.
    pub fn file_pointer(&self) -> String {
        format!("FILE__{}", self.env_name())
    }

    /// URL pointer variable, e.g. `URL__DNSEXIT_API_KEY`.
    pub fn url_pointer(&self) -> String {
        format!("URL__{}", self.env_name())
    }

    /// Key holding the JSON header map for the URL source.
    ///
    /// Its own environment variable is `URL__<KEY>_HEADERS`.
    pub fn url_headers_key(&self) -> ConfigKey {
        ConfigKey(format!("url__{}_headers", self.0))
    }

    /// Header maps usually carry credentials, so they are always sensitive.
    pub fn is_sensitive(&self) -> bool {
        is_sensitive_key(&self.0) || (self.0.starts_with("url__") && self.0.ends_with("_headers"))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConfigKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Static description of a known setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub name: &'static str,
    pub default: Option<&'static str>,
    pub required: bool,
    pub description: &'static str,
}

impl KeySpec {
    pub fn key(&self) -> ConfigKey {
        ConfigKey::new(self.name)
    }
}

const fn required(name: &'static str, description: &'static str) -> KeySpec {
    KeySpec {
        name,
        default: None,
        required: true,
        description,
    }
}

const fn optional(
    name: &'static str,
    default: Option<&'static str>,
    description: &'static str,
) -> KeySpec {
    KeySpec {
        name,
        default,
        required: false,
        description,
    }
}

/// Every setting the hooks understand.
pub const REGISTRY: &[KeySpec] = &[
    required(DNSEXIT_API_KEY, "DNSExit API key"),
    required(LETSENCRYPT_EMAIL, "Let's Encrypt account email"),
    optional(
        DNSEXIT_API_URL,
        Some("https://api.dnsexit.com/dns/"),
        "DNSExit JSON API endpoint",
    ),
    optional(
        DNSEXIT_ZONE,
        None,
        "DNSExit zone, defaults to the challenge domain",
    ),
    optional(DNSEXIT_RECORD_TTL, Some("0"), "TXT record TTL"),
    optional(
        DNSEXIT_API_TIMEOUT,
        Some("30"),
        "Per-request API timeout in seconds",
    ),
    optional(
        DNSEXIT_API_MAX_ATTEMPTS,
        Some("3"),
        "Attempts for transient API failures",
    ),
    optional(
        DNSEXIT_API_RETRY_DELAY,
        Some("2"),
        "Base API retry delay in seconds",
    ),
    optional(
        DNS_PROPAGATION_WAIT,
        Some("300"),
        "Propagation timeout in seconds",
    ),
    optional(
        DNS_PROPAGATION_CHECK_INTERVAL,
        Some("15"),
        "Propagation poll interval in seconds",
    ),
    optional(
        DNS_PROPAGATION_ADDRESS,
        Some("ns12.dnsexit.com"),
        "Nameserver polled for the TXT record",
    ),
    optional(
        DNS_FINALIZATION_WAIT,
        Some("5"),
        "Extra wait after the record is first seen, in seconds",
    ),
    optional(
        DNS_QUERY_TIMEOUT,
        Some("5"),
        "Single DNS query timeout in seconds",
    ),
    optional(
        DNS_QUERY_MAX_FAILURES,
        Some("3"),
        "Consecutive DNS query failures tolerated",
    ),
    optional(LOG_LEVEL, Some("INFO"), "Log level"),
    optional(LOG_FORMAT, Some("text"), "Log format, text or json"),
];

/// Look up the registry entry for `key`.
pub fn spec_for(key: &ConfigKey) -> Option<&'static KeySpec> {
    REGISTRY.iter().find(|spec| spec.name == key.as_str())
}
