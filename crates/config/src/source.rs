//! Ranked configuration sources.

use std::fmt;

/// Where a resolved value came from, in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSource {
    /// `<secrets dir>/<key>`
    SecretFile,
    /// File named by `FILE__<KEY>`
    FileReference,
    /// Body of an HTTP GET to `URL__<KEY>`
    UrlReference,
    /// `<KEY>` environment variable
    DirectValue,
    /// Compiled-in default
    DefaultValue,
}

impl ConfigSource {
    /// Default resolution chain.
    pub const CHAIN: [ConfigSource; 5] = [
        ConfigSource::SecretFile,
        ConfigSource::FileReference,
        ConfigSource::UrlReference,
        ConfigSource::DirectValue,
        ConfigSource::DefaultValue,
    ];

    /// Whether resolving from this source touches the network.
    pub fn is_remote(&self) -> bool {
        matches!(self, ConfigSource::UrlReference)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfigSource::SecretFile => "Docker secret",
            ConfigSource::FileReference => "file reference",
            ConfigSource::UrlReference => "URL reference",
            ConfigSource::DirectValue => "environment",
            ConfigSource::DefaultValue => "default",
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
