//! DNS side of the DNS-01 challenge
//!
//! # Architecture
//!
//! - [`DnsProvider`] - Trait for creating and deleting TXT records through a provider API
//! - [`DnsExitProvider`] - DNSExit JSON API implementation with bounded retry
//! - [`PropagationChecker`] - Polls a nameserver until the TXT record is visible
//! - [`TxtResolver`] / [`HickoryTxtResolver`] - Single-nameserver TXT lookups
//!
//! # Challenge Flow
//!
//! 1. The auth hook computes `_acme-challenge.<domain>` (wildcard label stripped)
//! 2. [`DnsProvider::create_txt_record`] publishes the validation token
//! 3. [`PropagationChecker::wait_for_propagation`] polls until the value is served
//! 4. After validation the cleanup hook calls [`DnsProvider::delete_txt_record`]

pub mod dnsexit;
pub mod propagation;
pub mod provider;
pub mod resolver;

pub use dnsexit::{DnsExitConfig, DnsExitProvider};
pub use propagation::{PropagationChecker, PropagationConfig, PropagationError, PropagationState};
pub use provider::{
    challenge_record_name, normalize_domain, DnsProvider, DnsProviderError, DnsResult, RecordId,
    TxtRecord, ACME_CHALLENGE_RECORD,
};
pub use resolver::{DnsQueryError, HickoryTxtResolver, TxtResolver};
