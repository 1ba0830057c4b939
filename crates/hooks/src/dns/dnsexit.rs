//! DNSExit JSON API client
//!
//! All record operations are a single `POST` to the API endpoint with a JSON
//! body carrying the API key, the zone and one `add` or `delete` action.
//! Replies are `{"code": <int>, "message": <str>, "details": ...}` where
//! code `0` means success.
//!
//! Creates are sent with `overwrite: true`, so a second create for the same
//! name replaces the first value. `example.com` and `*.example.com` share
//! `_acme-challenge.example.com`; when both are in one certificate, the
//! second auth hook replaces the first token and that validation fails.

use async_trait::async_trait;
use dnsexit_common::{mask_json, retry, BackoffPolicy, Clock, Redactor, MASK};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::provider::{DnsProvider, DnsProviderError, DnsResult, RecordId};

pub const DEFAULT_API_URL: &str = "https://api.dnsexit.com/dns/";

const CODE_SUCCESS: i64 = 0;
const CODE_AUTHENTICATION_FAILED: i64 = 2;
const CODE_SYSTEM_ERROR: i64 = 6;

/// Reply fragments DNSExit uses when a delete targets a missing record.
/// Only matched in replies that talk about a record, never a domain or zone.
const MISSING_RECORD_MARKERS: &[&str] = &["not found", "not exist", "no such", "no record"];

const MAX_ERROR_BODY: usize = 200;

#[derive(Clone)]
pub struct DnsExitConfig {
    pub api_key: String,
    pub api_url: String,
    /// TTL in DNSExit units (minutes); 0 lets the provider pick its minimum
    pub ttl: u32,
    /// Per-request timeout
    pub timeout: Duration,
    pub retry: BackoffPolicy,
}

impl DnsExitConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            ttl: 0,
            timeout: Duration::from_secs(30),
            retry: BackoffPolicy::default(),
        }
    }
}

impl fmt::Debug for DnsExitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsExitConfig")
            .field("api_key", &MASK)
            .field("api_url", &self.api_url)
            .field("ttl", &self.ttl)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ApiReply {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Option<Value>,
}

impl ApiReply {
    fn describe(&self) -> String {
        match &self.details {
            Some(details) if !details.is_null() => format!("{} ({})", self.message, details),
            _ => self.message.clone(),
        }
    }

    fn reports_missing_record(&self) -> bool {
        let text = self.describe().to_ascii_lowercase();
        if !text.contains("record") || text.contains("domain") || text.contains("zone") {
            return false;
        }
        MISSING_RECORD_MARKERS.iter().any(|m| text.contains(m))
    }
}

/// DNSExit implementation of [`DnsProvider`].
pub struct DnsExitProvider {
    config: DnsExitConfig,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
    redactor: Redactor,
}

impl DnsExitProvider {
    pub fn new(config: DnsExitConfig, clock: Arc<dyn Clock>) -> DnsResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(DnsProviderError::Configuration(
                "DNSExit API key is empty".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("dnsexit-certbot-hooks/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| DnsProviderError::Configuration(format!("HTTP client: {}", e)))?;

        let redactor = Redactor::new().with_secret(config.api_key.clone());

        debug!(
            api_url = %config.api_url,
            ttl = config.ttl,
            timeout_secs = config.timeout.as_secs(),
            max_attempts = config.retry.max_attempts,
            "Created DNSExit provider"
        );

        Ok(Self {
            config,
            http,
            clock,
            redactor,
        })
    }

    /// Send `body`, retrying transient failures per the configured policy.
    async fn call(&self, operation: &'static str, body: Value, tolerate_missing: bool) -> DnsResult<()> {
        let body = &body;
        retry(&self.config.retry, self.clock.as_ref(), operation, move |attempt| {
            self.send_once(operation, body, attempt, tolerate_missing)
        })
        .await
        .map_err(DnsProviderError::from)
    }

    async fn send_once(
        &self,
        operation: &'static str,
        body: &Value,
        attempt: u32,
        tolerate_missing: bool,
    ) -> DnsResult<()> {
        debug!(
            operation,
            attempt,
            body = %mask_json(body),
            "Sending DNSExit API request"
        );

        let response = self
            .http
            .post(&self.config.api_url)
            .json(body)
            .send()
            .await
            .map_err(|e| DnsProviderError::Transient(self.redactor.redact(&e.to_string())))?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers().get(RETRY_AFTER));
        let text = response.text().await.map_err(|e| {
            DnsProviderError::Transient(format!(
                "failed to read reply: {}",
                self.redactor.redact(&e.to_string())
            ))
        })?;

        if status == StatusCode::NOT_FOUND && tolerate_missing {
            debug!(operation, "DNSExit returned 404, treating record as absent");
            return Ok(());
        }
        self.check_status(status, retry_after, &text)?;

        let reply: ApiReply = serde_json::from_str(&text).map_err(|_| {
            DnsProviderError::MalformedResponse(format!(
                "HTTP {} with non-JSON body: {}",
                status.as_u16(),
                self.snippet(&text)
            ))
        })?;

        debug!(operation, code = reply.code, "DNSExit API reply");

        match reply.code {
            CODE_SUCCESS => Ok(()),
            CODE_AUTHENTICATION_FAILED => Err(DnsProviderError::Authentication(
                self.redactor.redact(&reply.describe()),
            )),
            _ if tolerate_missing && reply.reports_missing_record() => {
                debug!(operation, message = %reply.message, "Record already absent");
                Ok(())
            }
            CODE_SYSTEM_ERROR => Err(DnsProviderError::Transient(format!(
                "DNSExit system error: {}",
                self.redactor.redact(&reply.describe())
            ))),
            code => Err(DnsProviderError::Permanent {
                status: Some(status.as_u16()),
                message: format!("code {}: {}", code, self.redactor.redact(&reply.describe())),
            }),
        }
    }

    fn check_status(&self, status: StatusCode, retry_after: Option<Duration>, text: &str) -> DnsResult<()> {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DnsProviderError::RateLimited { retry_after });
        }
        if status.is_server_error() {
            return Err(DnsProviderError::Transient(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DnsProviderError::Authentication(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }
        if status.is_client_error() {
            return Err(DnsProviderError::Permanent {
                status: Some(status.as_u16()),
                message: format!("HTTP {}: {}", status.as_u16(), self.snippet(text)),
            });
        }
        Ok(())
    }

    fn snippet(&self, text: &str) -> String {
        let redacted = self.redactor.redact(text.trim());
        if redacted.chars().count() > MAX_ERROR_BODY {
            let cut: String = redacted.chars().take(MAX_ERROR_BODY).collect();
            format!("{}...", cut)
        } else {
            redacted
        }
    }
}

impl fmt::Debug for DnsExitProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnsExitProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DnsProvider for DnsExitProvider {
    fn name(&self) -> &'static str {
        "dnsexit"
    }

    async fn create_txt_record(&self, zone: &str, name: &str, value: &str) -> DnsResult<RecordId> {
        let body = json!({
            "apikey": self.config.api_key,
            "domain": zone,
            "add": {
                "type": "TXT",
                "name": name,
                "content": value,
                "ttl": self.config.ttl,
                "overwrite": true,
            }
        });

        self.call("create_txt_record", body, false).await?;
        info!(zone = %zone, record = %name, "Created TXT record");
        Ok(RecordId::new(name))
    }

    async fn delete_txt_record(&self, zone: &str, name: &str, _value: Option<&str>) -> DnsResult<()> {
        // DNSExit deletes by name only
        let body = json!({
            "apikey": self.config.api_key,
            "domain": zone,
            "delete": {
                "type": "TXT",
                "name": name,
            }
        });

        match self.call("delete_txt_record", body, true).await {
            Ok(()) => {
                info!(zone = %zone, record = %name, "Deleted TXT record");
                Ok(())
            }
            Err(e) => {
                warn!(zone = %zone, record = %name, error = %e, "Failed to delete TXT record");
                Err(e)
            }
        }
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
