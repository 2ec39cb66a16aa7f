//! Observability infrastructure for the gasmarket server.
//!
//! Provides structured logging configured from the environment.

use tracing_subscriber::{
    EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Log format configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable pretty format for development.
    Pretty,
    /// JSON format for production log aggregation.
    Json,
}

impl LogFormat {
    /// Determines log format from the `LOG_FORMAT` environment variable:
    /// `json` selects JSON output, anything else (or unset) selects pretty.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT").unwrap_or_default().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Initializes structured logging.
///
/// Log levels come from `RUST_LOG` and default to `info`.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => {
            subscriber.with(fmt::layer().with_target(true)).init();
        }
        LogFormat::Json => {
            subscriber.with(fmt::layer().json().with_current_span(true)).init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_defaults_to_pretty() {
        // SAFETY: tests in this module run in one process; the variable is
        // removed before reading it.
        unsafe { std::env::remove_var("LOG_FORMAT") };
        assert_eq!(LogFormat::from_env(), LogFormat::Pretty);
    }
}
