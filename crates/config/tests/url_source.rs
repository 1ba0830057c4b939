//! URL-referenced configuration values against a mock secret store.

use dnsexit_common::{LogCapture, LogConfig, LogLevel};
use dnsexit_config::keys::{self, ConfigKey};
use dnsexit_config::{ConfigResolver, ConfigSource, Environment};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolver(pairs: Vec<(String, String)>, secrets: &TempDir) -> ConfigResolver {
    ConfigResolver::new(Environment::from_pairs(pairs))
        .unwrap()
        .with_secrets_dir(secrets.path())
        .with_url_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn test_url_value_with_headers_is_fetched_once() {
    let server = MockServer::start().await;
    let secrets = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/secret/dnsexit"))
        .and(header("X-Vault-Token", "vault-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("from-url\n"))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = resolver(
        vec![
            (
                "URL__DNSEXIT_API_KEY".into(),
                format!("{}/v1/secret/dnsexit", server.uri()),
            ),
            (
                "URL__DNSEXIT_API_KEY_HEADERS".into(),
                r#"{"X-Vault-Token": "vault-token"}"#.into(),
            ),
            ("DNSEXIT_API_KEY".into(), "from-env".into()),
        ],
        &secrets,
    );

    let key = ConfigKey::new(keys::DNSEXIT_API_KEY);
    for _ in 0..3 {
        let resolved = resolver.resolve(&key).await.unwrap().unwrap();
        assert_eq!(resolved.value(), "from-url");
        assert_eq!(resolved.source(), ConfigSource::UrlReference);
    }
}

#[tokio::test]
async fn test_url_error_status_falls_through_once() {
    let server = MockServer::start().await;
    let secrets = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = resolver(
        vec![
            ("URL__DNSEXIT_API_KEY".into(), server.uri()),
            ("DNSEXIT_API_KEY".into(), "from-env".into()),
        ],
        &secrets,
    );

    let key = ConfigKey::new(keys::DNSEXIT_API_KEY);
    let first = resolver.resolve(&key).await.unwrap().unwrap();
    let second = resolver.resolve(&key).await.unwrap().unwrap();

    assert_eq!(first.value(), "from-env");
    assert_eq!(first.source(), ConfigSource::DirectValue);
    assert_eq!(second.value(), "from-env");
}

#[tokio::test]
async fn test_url_empty_body_falls_through() {
    let server = MockServer::start().await;
    let secrets = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;

    let resolver = resolver(
        vec![("URL__DNS_PROPAGATION_WAIT".into(), server.uri())],
        &secrets,
    );

    let resolved = resolver
        .resolve(&ConfigKey::new(keys::DNS_PROPAGATION_WAIT))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(resolved.value(), "300");
    assert_eq!(resolved.source(), ConfigSource::DefaultValue);
}

#[tokio::test]
async fn test_invalid_header_map_skips_request() {
    let server = MockServer::start().await;
    let secrets = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("from-url"))
        .expect(0)
        .mount(&server)
        .await;

    let resolver = resolver(
        vec![
            ("URL__LETSENCRYPT_EMAIL".into(), server.uri()),
            ("URL__LETSENCRYPT_EMAIL_HEADERS".into(), "[1, 2, 3]".into()),
            ("LETSENCRYPT_EMAIL".into(), "ops@example.com".into()),
        ],
        &secrets,
    );

    let resolved = resolver
        .resolve(&ConfigKey::new(keys::LETSENCRYPT_EMAIL))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(resolved.value(), "ops@example.com");
}

#[tokio::test]
async fn test_unreachable_url_falls_through() {
    let secrets = TempDir::new().unwrap();
    let resolver = resolver(
        vec![
            // Port 9 (discard) on localhost refuses connections
            ("URL__LOG_LEVEL".into(), "http://127.0.0.1:9/level".into()),
            ("LOG_LEVEL".into(), "DEBUG".into()),
        ],
        &secrets,
    );

    let resolved = resolver
        .resolve(&ConfigKey::new(keys::LOG_LEVEL))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(resolved.value(), "DEBUG");
}

#[tokio::test]
async fn test_secret_file_wins_without_calling_url() {
    let server = MockServer::start().await;
    let secrets = TempDir::new().unwrap();
    std::fs::write(secrets.path().join("dnsexit_api_key"), "from-secret").unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("from-url"))
        .expect(0)
        .mount(&server)
        .await;

    let resolver = resolver(
        vec![("URL__DNSEXIT_API_KEY".into(), server.uri())],
        &secrets,
    );

    let resolved = resolver
        .resolve(&ConfigKey::new(keys::DNSEXIT_API_KEY))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(resolved.value(), "from-secret");
}

#[tokio::test]
async fn test_url_query_credentials_stay_out_of_logs() {
    let server = MockServer::start().await;
    let secrets = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/v1/secret/dnsexit"))
        .respond_with(ResponseTemplate::new(200).set_body_string("from-url"))
        .expect(1)
        .mount(&server)
        .await;

    let capture = LogCapture::new();
    let config = LogConfig {
        level: LogLevel::Debug,
        ..LogConfig::default()
    };
    let _guard = tracing::subscriber::set_default(config.subscriber(capture.clone()));

    let resolver = resolver(
        vec![(
            "URL__DNSEXIT_API_KEY".into(),
            format!("{}/v1/secret/dnsexit?token=query-credential", server.uri()),
        )],
        &secrets,
    );

    let resolved = resolver
        .resolve(&ConfigKey::new(keys::DNSEXIT_API_KEY))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.value(), "from-url");

    let logs = capture.contents();
    assert!(logs.contains("Fetching value from URL"));
    assert!(logs.contains(&server.uri()));
    assert!(!logs.contains("query-credential"));
    assert!(!logs.contains("/v1/secret/dnsexit"));
}
