//! DNS-01 challenge requests and per-domain cleanup tracking
//!
//! Certbot hands each hook invocation one domain and its validation token
//! through `CERTBOT_DOMAIN` and `CERTBOT_VALIDATION`. When several domains
//! are processed in one run, every record created is registered in a
//! [`CleanupLedger`] straight away, so a failure on a later domain never
//! leaves earlier records behind.

use dnsexit_common::MASK;
use dnsexit_config::Environment;
use std::fmt;
use tracing::{debug, info, warn};

use crate::dns::{challenge_record_name, normalize_domain, DnsProvider, DnsProviderError, TxtRecord};
use crate::hook::{AuthHook, HookError};

/// Variable carrying the domain being validated
pub const CERTBOT_DOMAIN: &str = "CERTBOT_DOMAIN";

/// Variable carrying the validation token (auth hook only)
pub const CERTBOT_VALIDATION: &str = "CERTBOT_VALIDATION";

#[derive(Clone, PartialEq, Eq)]
pub struct ChallengeRequest {
    domain: String,
    validation: Option<String>,
}

impl ChallengeRequest {
    pub fn new(domain: impl Into<String>, validation: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            validation: Some(validation.into()),
        }
    }

    /// Request for cleanup, where the token is not needed.
    pub fn for_cleanup(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            validation: None,
        }
    }

    /// Read the request certbot passes through the environment.
    ///
    /// `CERTBOT_VALIDATION` is only mandatory when `require_token` is set;
    /// the cleanup hook can do without it.
    pub fn from_env(env: &Environment, require_token: bool) -> Result<Self, HookError> {
        let domain = env
            .get_non_empty(CERTBOT_DOMAIN)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(HookError::MissingChallenge(CERTBOT_DOMAIN))?;

        let validation = env.get_non_empty(CERTBOT_VALIDATION).map(str::to_string);
        if require_token && validation.is_none() {
            return Err(HookError::MissingChallenge(CERTBOT_VALIDATION));
        }

        Ok(Self {
            domain: domain.to_string(),
            validation,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn validation(&self) -> Option<&str> {
        self.validation.as_deref()
    }

    /// `_acme-challenge.<domain>` with any wildcard label removed.
    pub fn record_name(&self) -> String {
        challenge_record_name(&self.domain)
    }

    /// Zone the record lives in unless overridden by configuration.
    pub fn default_zone(&self) -> String {
        normalize_domain(&self.domain)
    }
}

impl fmt::Debug for ChallengeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeRequest")
            .field("domain", &self.domain)
            .field("validation", &self.validation.as_ref().map(|_| MASK))
            .finish()
    }
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    domain: String,
    zone: String,
    record: TxtRecord,
}

/// Records that must be deleted once the batch is over.
#[derive(Debug, Default)]
pub struct CleanupLedger {
    entries: Vec<LedgerEntry>,
}

/// Result of deleting one ledger entry.
#[derive(Debug)]
pub struct CleanupOutcome {
    pub domain: String,
    pub record: String,
    pub result: Result<(), DnsProviderError>,
}

impl CleanupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a created record. Re-registering the same zone and name is a no-op.
    pub fn record(&mut self, domain: &str, zone: &str, record: TxtRecord) {
        if self
            .entries
            .iter()
            .any(|e| e.zone == zone && e.record.name == record.name)
        {
            debug!(record = %record.name, "Record already tracked for cleanup");
            return;
        }
        self.entries.push(LedgerEntry {
            domain: domain.to_string(),
            zone: zone.to_string(),
            record,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delete every tracked record. Each deletion is attempted regardless
    /// of how the others went.
    pub async fn cleanup_all(self, provider: &dyn DnsProvider) -> Vec<CleanupOutcome> {
        let mut outcomes = Vec::with_capacity(self.entries.len());

        for entry in self.entries {
            let result = provider
                .delete_txt_record(&entry.zone, &entry.record.name, Some(&entry.record.value))
                .await;

            if let Err(e) = &result {
                warn!(
                    domain = %entry.domain,
                    record = %entry.record.name,
                    error = %e,
                    "Cleanup failed, continuing with remaining records"
                );
            }

            outcomes.push(CleanupOutcome {
                domain: entry.domain,
                record: entry.record.name,
                result,
            });
        }

        outcomes
    }
}

/// Outcome of one domain's create and wait cycle.
#[derive(Debug)]
pub struct DomainOutcome {
    pub domain: String,
    pub result: Result<(), HookError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<DomainOutcome>,
    pub skipped: Vec<String>,
    pub cleanup: Vec<CleanupOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> bool {
        self.skipped.is_empty()
            && self.outcomes.iter().all(|o| o.result.is_ok())
            && self.cleanup.iter().all(|c| c.result.is_ok())
    }

    pub fn first_error(&self) -> Option<&HookError> {
        self.outcomes.iter().find_map(|o| o.result.as_ref().err())
    }
}

/// Create and confirm each challenge in turn, then clean up every record created.
///
/// Processing stops at the first failing domain; later domains are reported
/// as skipped. Cleanup always covers everything created up to that point.
pub async fn run_batch(
    hook: &AuthHook,
    provider: &dyn DnsProvider,
    requests: &[ChallengeRequest],
) -> BatchReport {
    let mut ledger = CleanupLedger::new();
    let mut report = BatchReport::default();

    for (index, request) in requests.iter().enumerate() {
        let zone = hook.zone_for(request);
        let result = match hook.create(request).await {
            Ok(record) => {
                ledger.record(request.domain(), &zone, record.clone());
                hook.confirm(&record).await
            }
            Err(HookError::DnsApi(e)) if e.may_have_applied() => {
                // The create may have landed even though no success reply arrived
                if let Some(token) = request.validation() {
                    ledger.record(
                        request.domain(),
                        &zone,
                        TxtRecord::new(request.record_name(), token),
                    );
                }
                Err(HookError::DnsApi(e))
            }
            Err(e) => Err(e),
        };

        let failed = result.is_err();
        report.outcomes.push(DomainOutcome {
            domain: request.domain().to_string(),
            result,
        });

        if failed {
            report.skipped = requests[index + 1..]
                .iter()
                .map(|r| r.domain().to_string())
                .collect();
            break;
        }
    }

    info!(records = ledger.len(), "Cleaning up challenge records");
    report.cleanup = ledger.cleanup_all(provider).await;
    report
}
