//! Shared building blocks for the DNSExit certbot hooks.
//!
//! - [`masking`]: sensitivity rules and redaction for anything that reaches a log line
//! - [`logging`]: explicit log configuration and subscriber construction
//! - [`clock`]: time and sleep abstraction so waits can be faked in tests
//! - [`retry`]: bounded exponential backoff for transient failures

pub mod clock;
pub mod logging;
pub mod masking;
pub mod retry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use logging::{LogCapture, LogConfig, LogFormat, LogLevel, LoggingError};
pub use masking::{is_sensitive_key, mask_if_sensitive, mask_json, Redactor, MASK};
pub use retry::{retry, BackoffPolicy, RetryError, Retryable};
