//! Layered configuration and secret resolution.
//!
//! Each setting is identified by a [`ConfigKey`] and resolved by trying an
//! ordered chain of [`ConfigSource`]s, first hit wins:
//!
//! 1. [`ConfigSource::SecretFile`] - `<secrets dir>/<key>` (Docker secret)
//! 2. [`ConfigSource::FileReference`] - path named by `FILE__<KEY>`
//! 3. [`ConfigSource::UrlReference`] - HTTP GET of `URL__<KEY>`, with
//!    optional headers from `URL__<KEY>_HEADERS`
//! 4. [`ConfigSource::DirectValue`] - the `<KEY>` environment variable
//! 5. [`ConfigSource::DefaultValue`] - compiled-in default from [`keys::REGISTRY`]
//!
//! File sources that are configured but unreadable are hard errors. A
//! failing URL source only logs a warning and falls through.
//!
//! # Example
//!
//! ```ignore
//! let resolver = ConfigResolver::new(Environment::from_process())?;
//! let api_key = resolver.require(&ConfigKey::new(keys::DNSEXIT_API_KEY)).await?;
//! info!(setting = %api_key, "Using API key"); // value renders as ***MASKED***
//! ```

pub mod env;
pub mod error;
pub mod keys;
pub mod resolver;
pub mod source;
pub mod value;

pub use env::Environment;
pub use error::{ConfigError, ConfigResult};
pub use keys::{ConfigKey, KeySpec};
pub use resolver::ConfigResolver;
pub use source::ConfigSource;
pub use value::ResolvedValue;
