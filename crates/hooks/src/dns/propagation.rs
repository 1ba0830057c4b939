//! DNS propagation checking for DNS-01 challenges
//!
//! Polls one nameserver until the challenge TXT record carries the expected
//! value. Not seeing the value in time is an outcome
//! ([`PropagationState::TimedOut`]), while repeated hard query failures are
//! an error.

use dnsexit_common::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::resolver::{DnsQueryError, TxtResolver};

/// DNSExit's own nameserver, which sees new records first
pub const DEFAULT_NAMESERVER: &str = "ns12.dnsexit.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationConfig {
    /// Nameserver polled for the record
    pub nameserver: String,
    /// Overall wait budget
    pub timeout: Duration,
    /// Delay between polls
    pub poll_interval: Duration,
    /// Extra wait after the value is first seen, for secondary nameservers
    pub finalization_delay: Duration,
    /// Consecutive failed queries tolerated before giving up
    pub max_query_failures: u32,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            nameserver: DEFAULT_NAMESERVER.to_string(),
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(15),
            finalization_delay: Duration::from_secs(5),
            max_query_failures: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationState {
    Pending,
    Visible,
    TimedOut,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PropagationError {
    #[error("DNS queries for {record} failed {attempts} times in a row: {last}")]
    QueryFailed {
        record: String,
        attempts: u32,
        last: DnsQueryError,
    },
}

#[derive(Debug)]
pub struct PropagationChecker {
    config: PropagationConfig,
    resolver: Arc<dyn TxtResolver>,
    clock: Arc<dyn Clock>,
}

impl PropagationChecker {
    pub fn new(config: PropagationConfig, resolver: Arc<dyn TxtResolver>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            resolver,
            clock,
        }
    }

    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Single query: is `expected` among the TXT values at `record`?
    pub async fn check_once(&self, record: &str, expected: &str) -> Result<bool, DnsQueryError> {
        let values = self.resolver.lookup_txt(record).await?;
        debug!(record = %record, answers = values.len(), "TXT lookup answered");
        Ok(values.iter().any(|v| v == expected))
    }

    /// Poll until `expected` is served at `record` or the budget runs out.
    ///
    /// On `Visible` the finalization delay has already been slept.
    pub async fn wait_for_propagation(
        &self,
        record: &str,
        expected: &str,
    ) -> Result<PropagationState, PropagationError> {
        let start = self.clock.now();
        let max_failures = self.config.max_query_failures.max(1);
        let mut consecutive_failures = 0u32;
        let mut poll = 0u32;

        info!(
            record = %record,
            nameserver = %self.config.nameserver,
            timeout_secs = self.config.timeout.as_secs(),
            interval_secs = self.config.poll_interval.as_secs(),
            "Waiting for DNS propagation"
        );

        loop {
            poll += 1;
            match self.check_once(record, expected).await {
                Ok(true) => {
                    let elapsed = self.clock.now().saturating_duration_since(start);
                    info!(
                        record = %record,
                        polls = poll,
                        elapsed_secs = elapsed.as_secs(),
                        "TXT record is visible"
                    );
                    if !self.config.finalization_delay.is_zero() {
                        debug!(
                            delay_secs = self.config.finalization_delay.as_secs(),
                            "Waiting for secondary nameservers"
                        );
                        self.clock.sleep(self.config.finalization_delay).await;
                    }
                    return Ok(PropagationState::Visible);
                }
                Ok(false) => {
                    consecutive_failures = 0;
                    debug!(record = %record, poll, state = ?PropagationState::Pending, "TXT record not visible yet");
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        record = %record,
                        poll,
                        failures = consecutive_failures,
                        error = %e,
                        "DNS query failed"
                    );
                    if consecutive_failures >= max_failures {
                        return Err(PropagationError::QueryFailed {
                            record: record.to_string(),
                            attempts: consecutive_failures,
                            last: e,
                        });
                    }
                }
            }

            let elapsed = self.clock.now().saturating_duration_since(start);
            let remaining = self.config.timeout.saturating_sub(elapsed);
            if remaining.is_zero() {
                warn!(
                    record = %record,
                    polls = poll,
                    timeout_secs = self.config.timeout.as_secs(),
                    "DNS propagation timed out"
                );
                return Ok(PropagationState::TimedOut);
            }

            self.clock.sleep(self.config.poll_interval.min(remaining)).await;
        }
    }
}
