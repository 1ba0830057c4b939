//! DNS provider abstraction
//!
//! The hooks only ever talk to a provider through [`DnsProvider`], so a
//! different provider can be dropped in without touching the orchestration.

use async_trait::async_trait;
use dnsexit_common::{RetryError, Retryable, MASK};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Label prefixed to the domain for DNS-01 TXT records
pub const ACME_CHALLENGE_RECORD: &str = "_acme-challenge";

/// Provider-side identifier of a TXT record.
///
/// DNSExit does not hand out record ids, so for it the id is the record name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A DNS-01 challenge TXT record.
#[derive(Clone, PartialEq, Eq)]
pub struct TxtRecord {
    pub name: String,
    pub value: String,
    pub id: Option<RecordId>,
}

impl TxtRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }
}

impl fmt::Debug for TxtRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxtRecord")
            .field("name", &self.name)
            .field("value", &MASK)
            .field("id", &self.id)
            .finish()
    }
}

/// Strip a wildcard label and trailing dot, lower-case the rest.
///
/// `*.Example.COM.` becomes `example.com`.
pub fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().trim_end_matches('.');
    let domain = domain.strip_prefix("*.").unwrap_or(domain);
    domain.to_ascii_lowercase()
}

/// TXT record name for a challenge domain.
///
/// The prefix goes on the base domain for wildcards, so `*.example.com`
/// and `example.com` share `_acme-challenge.example.com`.
pub fn challenge_record_name(domain: &str) -> String {
    format!("{}.{}", ACME_CHALLENGE_RECORD, normalize_domain(domain))
}

#[derive(Debug, Error)]
pub enum DnsProviderError {
    /// Network failure, timeout or server-side error worth retrying
    #[error("transient DNS API failure: {0}")]
    Transient(String),

    #[error("DNS API rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("DNS API rejected the credentials: {0}")]
    Authentication(String),

    /// Request rejected for a reason retrying cannot fix
    #[error("DNS API request failed: {message}")]
    Permanent { status: Option<u16>, message: String },

    #[error("malformed DNS API response: {0}")]
    MalformedResponse(String),

    #[error("DNS provider configuration error: {0}")]
    Configuration(String),

    #[error("DNS API still failing after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<DnsProviderError>,
    },
}

impl DnsProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited { .. })
    }

    /// Whether the change may have reached the provider despite the error.
    ///
    /// A lost reply or an unreadable one says nothing about what the server
    /// did, so callers holding cleanup duties must assume it was applied.
    pub fn may_have_applied(&self) -> bool {
        match self {
            Self::Transient(_) | Self::MalformedResponse(_) => true,
            Self::RetriesExhausted { last, .. } => last.may_have_applied(),
            Self::RateLimited { .. }
            | Self::Authentication(_)
            | Self::Permanent { .. }
            | Self::Configuration(_) => false,
        }
    }
}

impl Retryable for DnsProviderError {
    fn is_transient(&self) -> bool {
        DnsProviderError::is_transient(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<RetryError<DnsProviderError>> for DnsProviderError {
    fn from(e: RetryError<DnsProviderError>) -> Self {
        match e {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { attempts, last } => Self::RetriesExhausted {
                attempts,
                last: Box::new(last),
            },
        }
    }
}

pub type DnsResult<T> = Result<T, DnsProviderError>;

/// TXT record management through a DNS provider API.
///
/// Implementations retry transient failures themselves and only surface
/// permanent errors or [`DnsProviderError::RetriesExhausted`].
#[async_trait]
pub trait DnsProvider: Send + Sync + fmt::Debug {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Create (or overwrite) the TXT record `name` in `zone`.
    async fn create_txt_record(&self, zone: &str, name: &str, value: &str) -> DnsResult<RecordId>;

    /// Delete the TXT record `name` in `zone`.
    ///
    /// Must succeed when the record does not exist. `value` narrows the
    /// deletion for providers that support it.
    async fn delete_txt_record(&self, zone: &str, name: &str, value: Option<&str>) -> DnsResult<()>;
}
