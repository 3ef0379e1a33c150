//! Tracing subscriber setup
//!
//! Everything in Paylane logs through `tracing`. Binaries call
//! [`init_tracing`] once at startup; `RUST_LOG` overrides the configured
//! level when it is set.

use serde::Serialize;
use std::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt};

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human readable
    Pretty,
    /// Single-line
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Get format from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        })
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown log format: {}", s))
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSettings {
    /// Filter directive, e.g. `info` or `paylane_webhooks=debug,info`
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LogSettings {
    /// Filter used when `RUST_LOG` is absent or invalid
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber
///
/// Returns `false` if a subscriber was already installed, which leaves the
/// existing one in place.
pub fn init_tracing(settings: &LogSettings) -> bool {
    let registry = tracing_subscriber::registry().with(settings.filter());

    let installed = match settings.format {
        LogFormat::Pretty => registry.with(tracing_fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(tracing_fmt::layer().compact()).try_init(),
        LogFormat::Json => registry
            .with(tracing_fmt::layer().json().flatten_event(true))
            .try_init(),
    };

    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("xml"), None);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let settings = LogSettings {
            level: "debug".to_string(),
            format: LogFormat::Json,
        };
        let first = init_tracing(&settings);
        let second = init_tracing(&settings);
        assert!(!(first && second));
    }
}
