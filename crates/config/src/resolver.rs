//! Ranked-source resolver.

use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::env::Environment;
use crate::error::{ConfigError, ConfigResult};
use crate::keys::{spec_for, ConfigKey};
use crate::source::ConfigSource;
use crate::value::ResolvedValue;

/// Mount point for Docker secrets.
pub const DEFAULT_SECRETS_DIR: &str = "/run/secrets";

/// Variable overriding [`DEFAULT_SECRETS_DIR`].
pub const SECRETS_DIR_VAR: &str = "CONFIG_SECRETS_DIR";

/// Timeout for a URL-referenced value.
pub const DEFAULT_URL_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves settings through an ordered chain of [`ConfigSource`]s.
///
/// One resolver lives for one hook invocation. URL lookups are cached per
/// key (hits and misses alike), so a remote secret store is asked at most
/// once per key per process.
pub struct ConfigResolver {
    env: Environment,
    secrets_dir: PathBuf,
    sources: Vec<ConfigSource>,
    http: reqwest::Client,
    url_timeout: Duration,
    url_cache: Mutex<HashMap<ConfigKey, Option<String>>>,
}

impl ConfigResolver {
    pub fn new(env: Environment) -> ConfigResult<Self> {
        let secrets_dir = env
            .get_non_empty(SECRETS_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_DIR));

        let http = reqwest::Client::builder()
            .user_agent(concat!("dnsexit-certbot-hooks/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            env,
            secrets_dir,
            sources: ConfigSource::CHAIN.to_vec(),
            http,
            url_timeout: DEFAULT_URL_TIMEOUT,
            url_cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_secrets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.secrets_dir = dir.into();
        self
    }

    /// Replace the resolution chain. Order is significant.
    pub fn with_sources(mut self, sources: Vec<ConfigSource>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_url_timeout(mut self, timeout: Duration) -> Self {
        self.url_timeout = timeout;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn secrets_dir(&self) -> &Path {
        &self.secrets_dir
    }

    /// Resolve `key` through every source. `Ok(None)` means no source had a value.
    pub async fn resolve(&self, key: &ConfigKey) -> ConfigResult<Option<ResolvedValue>> {
        for source in &self.sources {
            let found = if source.is_remote() {
                self.lookup_url(key).await?
            } else {
                self.lookup_local(*source, key)?
            };

            if let Some(value) = found {
                return Ok(Some(self.loaded(key, value, *source)));
            }
        }

        debug!(key = %key, "No value in any source");
        Ok(None)
    }

    /// Resolve `key`, failing with [`ConfigError::MissingRequired`] if it is unset.
    pub async fn require(&self, key: &ConfigKey) -> ConfigResult<ResolvedValue> {
        self.resolve(key)
            .await?
            .ok_or_else(|| ConfigError::MissingRequired {
                key: key.to_string(),
            })
    }

    /// Resolve without the network source.
    ///
    /// Used for settings needed before anything may touch the network, such
    /// as logging, and for the URL source's own header map.
    pub fn resolve_local(&self, key: &ConfigKey) -> ConfigResult<Option<ResolvedValue>> {
        for source in self.sources.iter().filter(|s| !s.is_remote()) {
            if let Some(value) = self.lookup_local(*source, key)? {
                return Ok(Some(self.loaded(key, value, *source)));
            }
        }
        Ok(None)
    }

    fn loaded(&self, key: &ConfigKey, value: String, source: ConfigSource) -> ResolvedValue {
        let resolved = ResolvedValue::new(key.clone(), value, source);
        if source == ConfigSource::DefaultValue {
            debug!("Loaded {} from {}", key, source);
        } else {
            info!("Loaded {} from {}", key, source);
        }
        debug!(setting = %resolved, "Resolved setting");
        resolved
    }

    fn lookup_local(&self, source: ConfigSource, key: &ConfigKey) -> ConfigResult<Option<String>> {
        match source {
            ConfigSource::SecretFile => {
                let path = self.secrets_dir.join(key.as_str());
                match fs::read_to_string(&path) {
                    Ok(content) => Ok(non_empty(strip_trailing_newline(content))),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(unreadable(key, path, source, e)),
                }
            }
            ConfigSource::FileReference => {
                let Some(pointer) = self.env.get_non_empty(&key.file_pointer()) else {
                    return Ok(None);
                };
                let path = PathBuf::from(pointer);
                match fs::read_to_string(&path) {
                    Ok(content) => Ok(non_empty(strip_trailing_newline(content))),
                    Err(e) => Err(unreadable(key, path, source, e)),
                }
            }
            ConfigSource::DirectValue => Ok(self
                .env
                .get_non_empty(&key.env_name())
                .map(str::to_string)),
            ConfigSource::DefaultValue => Ok(spec_for(key)
                .and_then(|spec| spec.default)
                .map(str::to_string)),
            ConfigSource::UrlReference => Ok(None),
        }
    }

    async fn lookup_url(&self, key: &ConfigKey) -> ConfigResult<Option<String>> {
        let Some(url) = self.env.get_non_empty(&key.url_pointer()) else {
            return Ok(None);
        };

        if let Some(cached) = self.url_cache.lock().get(key) {
            return Ok(cached.clone());
        }

        let fetched = match self.url_headers(key)? {
            Some(headers) => self.fetch(key, url, headers).await,
            None => None,
        };

        self.url_cache.lock().insert(key.clone(), fetched.clone());
        Ok(fetched)
    }

    /// Header map for the URL source. `None` means the map is invalid and the
    /// source should be skipped.
    fn url_headers(&self, key: &ConfigKey) -> ConfigResult<Option<HeaderMap>> {
        let headers_key = key.url_headers_key();
        let Some(raw) = self.resolve_local(&headers_key)? else {
            return Ok(Some(HeaderMap::new()));
        };

        let parsed: HashMap<String, String> = match serde_json::from_str(raw.value()) {
            Ok(map) => map,
            Err(e) => {
                warn!(
                    key = %key,
                    variable = %headers_key.env_name(),
                    error = %e,
                    "URL headers are not a JSON object of strings, skipping URL source"
                );
                return Ok(None);
            }
        };

        let mut headers = HeaderMap::new();
        for (name, value) in parsed {
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) else {
                warn!(key = %key, header = %name, "Invalid URL header, skipping URL source");
                return Ok(None);
            };
            headers.insert(name, value);
        }
        Ok(Some(headers))
    }

    async fn fetch(&self, key: &ConfigKey, url: &str, headers: HeaderMap) -> Option<String> {
        debug!(key = %key, origin = %url_origin(url), "Fetching value from URL");

        let response = match self
            .http
            .get(url)
            .headers(headers)
            .timeout(self.url_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(key = %key, error = %e.without_url(), "URL source request failed, falling through");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(key = %key, status = status.as_u16(), "URL source returned an error status, falling through");
            return None;
        }

        match response.text().await {
            Ok(body) => {
                let value = non_empty(strip_trailing_newline(body));
                if value.is_none() {
                    warn!(key = %key, "URL source returned an empty body, falling through");
                }
                value
            }
            Err(e) => {
                warn!(key = %key, error = %e.without_url(), "Failed to read URL source body, falling through");
                None
            }
        }
    }
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("secrets_dir", &self.secrets_dir)
            .field("sources", &self.sources)
            .field("url_timeout", &self.url_timeout)
            .finish_non_exhaustive()
    }
}

/// Drop exactly one trailing newline (`\n` or `\r\n`).
fn strip_trailing_newline(mut content: String) -> String {
    if content.ends_with('\n') {
        content.pop();
        if content.ends_with('\r') {
            content.pop();
        }
    }
    content
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn unreadable(key: &ConfigKey, path: PathBuf, origin: ConfigSource, e: io::Error) -> ConfigError {
    ConfigError::UnreadableFile {
        key: key.to_string(),
        path,
        origin,
        reason: e.to_string(),
    }
}
