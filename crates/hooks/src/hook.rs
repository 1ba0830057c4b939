//! Auth and cleanup hook orchestration
//!
//! An auth run moves through
//! `Start -> ConfigResolved -> RecordCreated -> PropagationConfirmed -> Done`;
//! any failure jumps straight to `Done` with an error. The hooks never retry
//! the whole create-and-wait cycle themselves, certbot decides what happens
//! after a failed attempt.

use dnsexit_config::ConfigError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::challenge::ChallengeRequest;
use crate::dns::{
    DnsProvider, DnsProviderError, DnsQueryError, PropagationChecker, PropagationError,
    PropagationState, TxtRecord,
};

/// Process exit codes
pub mod exit {
    pub const SUCCESS: i32 = 0;
    /// DNS API failure or anything unexpected
    pub const FAILURE: i32 = 1;
    pub const PROPAGATION_TIMEOUT: i32 = 3;
    /// Hook not invoked the way certbot invokes it (EX_USAGE)
    pub const USAGE: i32 = 64;
    /// Configuration missing or unreadable (EX_CONFIG)
    pub const CONFIG: i32 = 78;
    /// Terminated by SIGINT or SIGTERM
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    Start,
    ConfigResolved,
    RecordCreated,
    PropagationConfirmed,
    Done,
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0} is not set; this hook must be run by certbot")]
    MissingChallenge(&'static str),

    #[error(transparent)]
    DnsApi(#[from] DnsProviderError),

    #[error("TXT record {record} was not visible after {}s", .waited.as_secs())]
    PropagationTimeout { record: String, waited: Duration },

    #[error(transparent)]
    Propagation(#[from] PropagationError),

    #[error("DNS resolver setup failed: {0}")]
    Resolver(#[from] DnsQueryError),

    #[error("interrupted by {0}")]
    Interrupted(&'static str),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl HookError {
    pub fn exit_code(&self) -> i32 {
        match self {
            HookError::Config(_) => exit::CONFIG,
            HookError::MissingChallenge(_) => exit::USAGE,
            HookError::PropagationTimeout { .. } => exit::PROPAGATION_TIMEOUT,
            HookError::Interrupted(_) => exit::INTERRUPTED,
            HookError::DnsApi(_)
            | HookError::Propagation(_)
            | HookError::Resolver(_)
            | HookError::Unexpected(_) => exit::FAILURE,
        }
    }
}

fn transition(hook: &'static str, state: HookState) {
    debug!(hook, state = ?state, "Hook state");
}

/// Creates the challenge record and waits until it is served.
#[derive(Debug)]
pub struct AuthHook {
    provider: Arc<dyn DnsProvider>,
    checker: PropagationChecker,
    zone: Option<String>,
}

impl AuthHook {
    pub fn new(provider: Arc<dyn DnsProvider>, checker: PropagationChecker) -> Self {
        Self {
            provider,
            checker,
            zone: None,
        }
    }

    /// Use `zone` instead of the challenge domain as the provider zone.
    pub fn with_zone(mut self, zone: Option<String>) -> Self {
        self.zone = zone.filter(|z| !z.trim().is_empty());
        self
    }

    pub fn zone_for(&self, request: &ChallengeRequest) -> String {
        self.zone
            .clone()
            .unwrap_or_else(|| request.default_zone())
    }

    /// Publish the validation token.
    pub async fn create(&self, request: &ChallengeRequest) -> Result<TxtRecord, HookError> {
        let token = request
            .validation()
            .ok_or(HookError::MissingChallenge(crate::challenge::CERTBOT_VALIDATION))?;
        let zone = self.zone_for(request);
        let name = request.record_name();

        info!(
            "DNS challenge start for {}: creating TXT record",
            request.domain()
        );
        debug!(provider = self.provider.name(), zone = %zone, record = %name, "Creating TXT record");

        let id = self.provider.create_txt_record(&zone, &name, token).await?;
        transition("auth", HookState::RecordCreated);
        info!("DNS record added for {}: success", request.domain());

        Ok(TxtRecord::new(name, token).with_id(id))
    }

    /// Wait until `record` is visible on the configured nameserver.
    pub async fn confirm(&self, record: &TxtRecord) -> Result<(), HookError> {
        match self
            .checker
            .wait_for_propagation(&record.name, &record.value)
            .await?
        {
            PropagationState::Visible => {
                transition("auth", HookState::PropagationConfirmed);
                Ok(())
            }
            PropagationState::TimedOut | PropagationState::Pending => {
                Err(HookError::PropagationTimeout {
                    record: record.name.clone(),
                    waited: self.checker.config().timeout,
                })
            }
        }
    }

    /// Create the record, then wait for it.
    pub async fn run(&self, request: &ChallengeRequest) -> Result<TxtRecord, HookError> {
        transition("auth", HookState::ConfigResolved);
        let record = self.create(request).await?;
        self.confirm(&record).await?;
        transition("auth", HookState::Done);
        Ok(record)
    }
}

/// Removes the challenge record; a missing record counts as removed.
#[derive(Debug)]
pub struct CleanupHook {
    provider: Arc<dyn DnsProvider>,
    zone: Option<String>,
}

impl CleanupHook {
    pub fn new(provider: Arc<dyn DnsProvider>) -> Self {
        Self {
            provider,
            zone: None,
        }
    }

    pub fn with_zone(mut self, zone: Option<String>) -> Self {
        self.zone = zone.filter(|z| !z.trim().is_empty());
        self
    }

    pub async fn run(&self, request: &ChallengeRequest) -> Result<(), HookError> {
        transition("cleanup", HookState::ConfigResolved);
        let zone = self
            .zone
            .clone()
            .unwrap_or_else(|| request.default_zone());
        let name = request.record_name();

        info!("DNS cleanup start for {}: deleting TXT record", request.domain());
        self.provider
            .delete_txt_record(&zone, &name, request.validation())
            .await?;
        info!("DNS record removed for {}: success", request.domain());

        transition("cleanup", HookState::Done);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{DnsResult, PropagationConfig, RecordId, TxtResolver};
    use async_trait::async_trait;
    use dnsexit_common::ManualClock;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<String>>,
        fail_delete: bool,
    }

    #[async_trait]
    impl DnsProvider for RecordingProvider {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn create_txt_record(&self, zone: &str, name: &str, _value: &str) -> DnsResult<RecordId> {
            self.calls.lock().push(format!("create {} {}", zone, name));
            Ok(RecordId::new(name))
        }

        async fn delete_txt_record(&self, zone: &str, name: &str, _value: Option<&str>) -> DnsResult<()> {
            self.calls.lock().push(format!("delete {} {}", zone, name));
            if self.fail_delete {
                return Err(DnsProviderError::Permanent {
                    status: Some(400),
                    message: "invalid domain".into(),
                });
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct StaticResolver(Vec<String>);

    #[async_trait]
    impl TxtResolver for StaticResolver {
        async fn lookup_txt(&self, _name: &str) -> Result<Vec<String>, DnsQueryError> {
            Ok(self.0.clone())
        }
    }

    fn auth_hook(provider: Arc<RecordingProvider>, answers: Vec<&str>) -> AuthHook {
        let checker = PropagationChecker::new(
            PropagationConfig {
                timeout: Duration::from_secs(30),
                ..PropagationConfig::default()
            },
            Arc::new(StaticResolver(answers.into_iter().map(String::from).collect())),
            Arc::new(ManualClock::new()),
        );
        AuthHook::new(provider, checker)
    }

    #[test]
    fn test_exit_codes_are_distinct_from_success() {
        let errors = [
            HookError::Config(ConfigError::MissingRequired {
                key: "dnsexit_api_key".into(),
            }),
            HookError::MissingChallenge("CERTBOT_DOMAIN"),
            HookError::DnsApi(DnsProviderError::Transient("HTTP 500".into())),
            HookError::PropagationTimeout {
                record: "_acme-challenge.example.com".into(),
                waited: Duration::from_secs(300),
            },
            HookError::Interrupted("SIGTERM"),
            HookError::Unexpected("boom".into()),
        ];
        let codes: Vec<i32> = errors.iter().map(HookError::exit_code).collect();
        assert_eq!(
            codes,
            vec![
                exit::CONFIG,
                exit::USAGE,
                exit::FAILURE,
                exit::PROPAGATION_TIMEOUT,
                exit::INTERRUPTED,
                exit::FAILURE
            ]
        );
        assert!(codes.iter().all(|c| *c != exit::SUCCESS));
    }

    #[tokio::test]
    async fn test_auth_uses_base_domain_for_wildcard() {
        let provider = Arc::new(RecordingProvider::default());
        let hook = auth_hook(provider.clone(), vec!["abc123"]);

        let record = hook
            .run(&ChallengeRequest::new("*.example.com", "abc123"))
            .await
            .unwrap();

        assert_eq!(record.name, "_acme-challenge.example.com");
        assert_eq!(record.id, Some(RecordId::new("_acme-challenge.example.com")));
        assert_eq!(
            provider.calls.lock().clone(),
            vec!["create example.com _acme-challenge.example.com"]
        );
    }

    #[tokio::test]
    async fn test_auth_zone_override() {
        let provider = Arc::new(RecordingProvider::default());
        let hook = auth_hook(provider.clone(), vec!["tok"]).with_zone(Some("example.com".into()));

        hook.run(&ChallengeRequest::new("www.example.com", "tok"))
            .await
            .unwrap();

        assert_eq!(
            provider.calls.lock().clone(),
            vec!["create example.com _acme-challenge.www.example.com"]
        );
    }

    #[tokio::test]
    async fn test_auth_timeout_is_reported() {
        let provider = Arc::new(RecordingProvider::default());
        let hook = auth_hook(provider, vec![]);

        let err = hook
            .run(&ChallengeRequest::new("example.com", "abc123"))
            .await
            .unwrap_err();

        assert!(matches!(err, HookError::PropagationTimeout { .. }));
        assert_eq!(err.exit_code(), exit::PROPAGATION_TIMEOUT);
    }

    #[tokio::test]
    async fn test_auth_requires_token() {
        let provider = Arc::new(RecordingProvider::default());
        let hook = auth_hook(provider.clone(), vec![]);

        let err = hook
            .create(&ChallengeRequest::for_cleanup("example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, HookError::MissingChallenge(_)));
        assert!(provider.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_deletes_same_record_name() {
        let provider = Arc::new(RecordingProvider::default());
        let hook = CleanupHook::new(provider.clone());

        hook.run(&ChallengeRequest::for_cleanup("*.Example.com"))
            .await
            .unwrap();

        assert_eq!(
            provider.calls.lock().clone(),
            vec!["delete example.com _acme-challenge.example.com"]
        );
    }

    #[tokio::test]
    async fn test_cleanup_surfaces_permanent_error() {
        let provider = Arc::new(RecordingProvider {
            fail_delete: true,
            ..Default::default()
        });
        let hook = CleanupHook::new(provider);

        let err = hook
            .run(&ChallengeRequest::for_cleanup("example.com"))
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), exit::FAILURE);
    }
}
