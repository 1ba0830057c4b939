//! TXT lookups against a single nameserver.

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const DNS_PORT: u16 = 53;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DnsQueryError {
    #[error("DNS query for {name} timed out")]
    Timeout { name: String },

    #[error("DNS query for {name} failed: {message}")]
    Failed { name: String, message: String },

    #[error("cannot resolve nameserver '{nameserver}': {message}")]
    Nameserver { nameserver: String, message: String },
}

/// Source of TXT answers for the propagation checker.
#[async_trait]
pub trait TxtResolver: Send + Sync + fmt::Debug {
    /// TXT values published at `name`, one string per record.
    ///
    /// A name that does not exist, or exists without TXT data, yields an
    /// empty list rather than an error.
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsQueryError>;
}

/// hickory-based resolver pinned to one nameserver with caching disabled.
pub struct HickoryTxtResolver {
    nameserver: String,
    resolver: TokioAsyncResolver,
}

impl HickoryTxtResolver {
    /// Build a resolver for `nameserver`, which may be an IP or a hostname.
    ///
    /// A hostname is resolved once through the system resolver.
    pub async fn new(nameserver: &str, query_timeout: Duration) -> Result<Self, DnsQueryError> {
        let ips = nameserver_addresses(nameserver).await?;
        debug!(nameserver = %nameserver, addresses = ?ips, "Using nameserver for propagation checks");

        let group = NameServerConfigGroup::from_ips_clear(&ips, DNS_PORT, true);
        let config = ResolverConfig::from_parts(None, vec![], group);

        let mut opts = ResolverOpts::default();
        opts.timeout = query_timeout;
        opts.attempts = 1;
        opts.cache_size = 0;

        Ok(Self {
            nameserver: nameserver.to_string(),
            resolver: TokioAsyncResolver::tokio(config, opts),
        })
    }

    pub fn nameserver(&self) -> &str {
        &self.nameserver
    }
}

impl fmt::Debug for HickoryTxtResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HickoryTxtResolver")
            .field("nameserver", &self.nameserver)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TxtResolver for HickoryTxtResolver {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsQueryError> {
        let fqdn = absolute_name(name);

        match self.resolver.txt_lookup(fqdn.as_str()).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|txt| {
                    // A TXT record may be split into several character-strings
                    txt.txt_data()
                        .iter()
                        .map(|part| String::from_utf8_lossy(part))
                        .collect::<String>()
                })
                .collect()),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
                ResolveErrorKind::Timeout => Err(DnsQueryError::Timeout { name: fqdn }),
                _ => Err(DnsQueryError::Failed {
                    name: fqdn,
                    message: e.to_string(),
                }),
            },
        }
    }
}

fn absolute_name(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

async fn nameserver_addresses(nameserver: &str) -> Result<Vec<IpAddr>, DnsQueryError> {
    let nameserver = nameserver.trim();
    if let Ok(ip) = nameserver.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let failed = |message: String| DnsQueryError::Nameserver {
        nameserver: nameserver.to_string(),
        message,
    };

    let mut ips: Vec<IpAddr> = tokio::net::lookup_host((nameserver, DNS_PORT))
        .await
        .map_err(|e| failed(e.to_string()))?
        .map(|addr| addr.ip())
        .collect();
    ips.sort();
    ips.dedup();

    if ips.is_empty() {
        return Err(failed("no addresses".to_string()));
    }
    Ok(ips)
}
