//! Typed hook settings resolved from the configuration chain.

use dnsexit_common::{BackoffPolicy, LogConfig};
use dnsexit_config::keys::{self, ConfigKey};
use dnsexit_config::{ConfigError, ConfigResolver, ConfigResult, ResolvedValue};
use std::time::Duration;

use crate::dns::{DnsExitConfig, PropagationConfig};

/// Environment variable with `RUST_LOG`-style filter directives
pub const LOG_DIRECTIVES_VAR: &str = "RUST_LOG";

/// Settings needed to talk to the DNS API.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub provider: DnsExitConfig,
    /// Zone override; `None` means use the challenge domain
    pub zone: Option<String>,
}

impl ApiSettings {
    pub async fn load(resolver: &ConfigResolver) -> ConfigResult<Self> {
        let api_key = resolver
            .require(&ConfigKey::new(keys::DNSEXIT_API_KEY))
            .await?
            .into_value();
        let api_url = setting(resolver, keys::DNSEXIT_API_URL).await?.into_value();
        let ttl = setting(resolver, keys::DNSEXIT_RECORD_TTL).await?.as_u32()?;
        let timeout = setting(resolver, keys::DNSEXIT_API_TIMEOUT).await?.as_secs()?;
        let max_attempts = setting(resolver, keys::DNSEXIT_API_MAX_ATTEMPTS)
            .await?
            .as_u32()?;
        let base_delay = setting(resolver, keys::DNSEXIT_API_RETRY_DELAY)
            .await?
            .as_secs()?;
        let zone = resolver
            .resolve(&ConfigKey::new(keys::DNSEXIT_ZONE))
            .await?
            .map(ResolvedValue::into_value);

        Ok(Self {
            provider: DnsExitConfig {
                api_key,
                api_url,
                ttl,
                timeout,
                retry: BackoffPolicy::default()
                    .with_max_attempts(max_attempts)
                    .with_base_delay(base_delay),
            },
            zone,
        })
    }
}

/// Settings for waiting on propagation.
#[derive(Debug, Clone)]
pub struct PropagationSettings {
    pub checker: PropagationConfig,
    /// Timeout of a single DNS query
    pub query_timeout: Duration,
}

impl PropagationSettings {
    pub async fn load(resolver: &ConfigResolver) -> ConfigResult<Self> {
        let checker = PropagationConfig {
            nameserver: setting(resolver, keys::DNS_PROPAGATION_ADDRESS)
                .await?
                .into_value(),
            timeout: setting(resolver, keys::DNS_PROPAGATION_WAIT).await?.as_secs()?,
            poll_interval: setting(resolver, keys::DNS_PROPAGATION_CHECK_INTERVAL)
                .await?
                .as_secs()?,
            finalization_delay: setting(resolver, keys::DNS_FINALIZATION_WAIT)
                .await?
                .as_secs()?,
            max_query_failures: setting(resolver, keys::DNS_QUERY_MAX_FAILURES)
                .await?
                .as_u32()?,
        };

        if checker.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: keys::DNS_PROPAGATION_CHECK_INTERVAL.to_string(),
                shown: "0".to_string(),
                expected: "a positive number of seconds",
            });
        }

        let query_timeout = setting(resolver, keys::DNS_QUERY_TIMEOUT).await?.as_secs()?;

        Ok(Self {
            checker,
            query_timeout,
        })
    }
}

/// Logging configuration from the non-network sources.
///
/// Resolved before logging is installed, so it must not touch the network.
pub fn log_config(resolver: &ConfigResolver) -> ConfigResult<LogConfig> {
    let level = resolver.resolve_local(&ConfigKey::new(keys::LOG_LEVEL))?;
    let format = resolver.resolve_local(&ConfigKey::new(keys::LOG_FORMAT))?;
    let directives = resolver
        .environment()
        .get_non_empty(LOG_DIRECTIVES_VAR)
        .map(str::to_string);

    Ok(LogConfig::from_values(
        level.as_ref().map(ResolvedValue::value),
        format.as_ref().map(ResolvedValue::value),
    )
    .with_directives(directives))
}

/// Resolve a setting that has a compiled-in default.
async fn setting(resolver: &ConfigResolver, name: &str) -> ConfigResult<ResolvedValue> {
    resolver.require(&ConfigKey::new(name)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnsexit_common::{LogFormat, LogLevel};
    use dnsexit_config::Environment;
    use tempfile::TempDir;

    fn resolver(pairs: &[(&str, &str)], secrets: &TempDir) -> ConfigResolver {
        ConfigResolver::new(Environment::from_pairs(pairs.iter().copied()))
            .unwrap()
            .with_secrets_dir(secrets.path())
    }

    #[tokio::test]
    async fn test_api_settings_defaults() {
        let secrets = TempDir::new().unwrap();
        let settings = ApiSettings::load(&resolver(&[("DNSEXIT_API_KEY", "abc")], &secrets))
            .await
            .unwrap();

        assert_eq!(settings.provider.api_key, "abc");
        assert_eq!(settings.provider.api_url, "https://api.dnsexit.com/dns/");
        assert_eq!(settings.provider.ttl, 0);
        assert_eq!(settings.provider.timeout, Duration::from_secs(30));
        assert_eq!(settings.provider.retry, BackoffPolicy::default());
        assert_eq!(settings.zone, None);
    }

    #[tokio::test]
    async fn test_api_settings_require_key() {
        let secrets = TempDir::new().unwrap();
        let err = ApiSettings::load(&resolver(&[], &secrets)).await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));
    }

    #[tokio::test]
    async fn test_api_settings_overrides() {
        let secrets = TempDir::new().unwrap();
        std::fs::write(secrets.path().join("dnsexit_api_key"), "from-secret\n").unwrap();

        let settings = ApiSettings::load(&resolver(
            &[
                ("DNSEXIT_API_KEY", "from-env"),
                ("DNSEXIT_ZONE", "example.com"),
                ("DNSEXIT_API_MAX_ATTEMPTS", "5"),
                ("DNSEXIT_API_RETRY_DELAY", "1"),
            ],
            &secrets,
        ))
        .await
        .unwrap();

        assert_eq!(settings.provider.api_key, "from-secret");
        assert_eq!(settings.zone.as_deref(), Some("example.com"));
        assert_eq!(settings.provider.retry.max_attempts, 5);
        assert_eq!(settings.provider.retry.base_delay, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_propagation_settings() {
        let secrets = TempDir::new().unwrap();
        let settings = PropagationSettings::load(&resolver(
            &[("DNS_PROPAGATION_WAIT", "120"), ("DNS_PROPAGATION_ADDRESS", "8.8.8.8")],
            &secrets,
        ))
        .await
        .unwrap();

        assert_eq!(settings.checker.timeout, Duration::from_secs(120));
        assert_eq!(settings.checker.poll_interval, Duration::from_secs(15));
        assert_eq!(settings.checker.finalization_delay, Duration::from_secs(5));
        assert_eq!(settings.checker.nameserver, "8.8.8.8");
        assert_eq!(settings.query_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_invalid_number_is_config_error() {
        let secrets = TempDir::new().unwrap();
        let err = PropagationSettings::load(&resolver(
            &[("DNS_PROPAGATION_WAIT", "soon")],
            &secrets,
        ))
        .await
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = PropagationSettings::load(&resolver(
            &[("DNS_PROPAGATION_CHECK_INTERVAL", "0")],
            &secrets,
        ))
        .await
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_log_config_from_settings() {
        let secrets = TempDir::new().unwrap();
        let config = log_config(&resolver(
            &[("LOG_LEVEL", "QUIET"), ("LOG_FORMAT", "json")],
            &secrets,
        ))
        .unwrap();
        assert_eq!(config.level, LogLevel::Error);
        assert_eq!(config.format, LogFormat::Json);

        let config = log_config(&resolver(&[], &secrets)).unwrap();
        assert_eq!(config, LogConfig::default());
    }
}
