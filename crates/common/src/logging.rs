//! Logging configuration.
//!
//! Log level and format are resolved like any other setting and passed in
//! as a [`LogConfig`] value. Library code never reads ambient state to decide
//! what to log; the binary installs the subscriber once at startup and tests
//! build their own subscriber around a [`LogCapture`].

use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    /// Accepts the usual level names plus `WARNING`, `CRITICAL` and `QUIET`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" | "CRITICAL" | "QUIET" => Ok(LogLevel::Error),
            _ => Err(LoggingError::UnknownLevel(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_directive())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single human-readable line per event
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggingError::UnknownFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unknown log level '{0}'")]
    UnknownLevel(String),

    #[error("unknown log format '{0}'")]
    UnknownFormat(String),

    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Explicit logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Optional `RUST_LOG`-style directives that take precedence over `level`
    pub directives: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            directives: None,
        }
    }
}

impl LogConfig {
    /// Build from raw setting values. Unrecognised values keep the default.
    pub fn from_values(level: Option<&str>, format: Option<&str>) -> Self {
        let defaults = Self::default();
        Self {
            level: level
                .and_then(|l| l.parse().ok())
                .unwrap_or(defaults.level),
            format: format
                .and_then(|f| f.parse().ok())
                .unwrap_or(defaults.format),
            directives: None,
        }
    }

    pub fn with_directives(mut self, directives: Option<String>) -> Self {
        self.directives = directives.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn env_filter(&self) -> EnvFilter {
        self.directives
            .as_deref()
            .and_then(|d| EnvFilter::try_new(d).ok())
            .unwrap_or_else(|| EnvFilter::new(self.level.as_directive()))
    }

    /// Build a subscriber writing to `make_writer`.
    pub fn subscriber<W>(&self, make_writer: W) -> Box<dyn Subscriber + Send + Sync>
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_writer(make_writer)
            .with_target(false)
            .with_ansi(false);

        match self.format {
            LogFormat::Text => Box::new(builder.finish()),
            LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        }
    }

    /// Install the global subscriber, logging to stderr.
    pub fn init(&self) -> Result<(), LoggingError> {
        tracing::subscriber::set_global_default(self.subscriber(io::stderr))
            .map_err(|e| LoggingError::Install(e.to_string()))
    }
}

/// In-memory log sink for asserting on emitted lines.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

pub struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, error, info, warn};

    #[test]
    fn test_level_names() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("CRITICAL".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert_eq!("QUIET".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("LOUD".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_from_values_falls_back_to_defaults() {
        let config = LogConfig::from_values(Some("verbose"), Some("xml"));
        assert_eq!(config, LogConfig::default());

        let config = LogConfig::from_values(Some("debug"), Some("JSON"));
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_text_output_respects_level() {
        let capture = LogCapture::new();
        let config = LogConfig::from_values(Some("WARNING"), None);
        let subscriber = config.subscriber(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            debug!("hidden debug");
            info!("hidden info");
            warn!(domain = "example.com", "visible warning");
            error!("visible error");
        });

        let out = capture.contents();
        assert!(!out.contains("hidden"));
        assert!(out.contains("WARN"));
        assert!(out.contains("visible warning"));
        assert!(out.contains("domain=\"example.com\""));
        assert_eq!(capture.lines().len(), 2);
    }

    #[test]
    fn test_json_output_is_one_object_per_line() {
        let capture = LogCapture::new();
        let config = LogConfig::from_values(Some("info"), Some("json"));
        let subscriber = config.subscriber(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            info!(record = "_acme-challenge.example.com", "Record created");
        });

        let lines = capture.lines();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["message"], "Record created");
        assert_eq!(parsed["record"], "_acme-challenge.example.com");
        assert!(parsed.get("timestamp").is_some());
    }

    #[test]
    fn test_directives_override_level() {
        let capture = LogCapture::new();
        let config = LogConfig::from_values(Some("error"), None)
            .with_directives(Some("debug".to_string()));
        let subscriber = config.subscriber(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            debug!("now visible");
        });

        assert!(capture.contents().contains("now visible"));
    }
}
