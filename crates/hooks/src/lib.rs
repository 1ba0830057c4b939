//! Certbot DNS-01 hooks for DNSExit
//!
//! Certbot runs `auth-hook` once per domain before asking the CA to
//! validate, and `cleanup-hook` once per domain afterwards. Both read the
//! challenge from `CERTBOT_DOMAIN` / `CERTBOT_VALIDATION` and their settings
//! through [`dnsexit_config::ConfigResolver`].
//!
//! # Architecture
//!
//! - [`dns`] - Provider trait, DNSExit client, propagation checker
//! - [`hook`] - [`AuthHook`] and [`CleanupHook`] orchestration and exit codes
//! - [`challenge`] - Challenge requests and the per-domain cleanup ledger
//! - [`settings`] - Typed settings resolved from the configuration chain
//! - [`cli`] - Process entry points used by the binaries

pub mod challenge;
pub mod cli;
pub mod dns;
pub mod hook;
pub mod settings;

pub use challenge::{run_batch, BatchReport, ChallengeRequest, CleanupLedger};
pub use cli::{main_with, Command, HookRuntime};
pub use hook::{exit, AuthHook, CleanupHook, HookError, HookState};
