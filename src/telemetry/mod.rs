//! Tracing initialization.
//!
//! Sets up tracing-subscriber with an env filter and a fmt layer on stderr.
//! `RUST_LOG` wins over the configured level when set.

pub mod quest;

use crate::error::{Error, Result};

/// Configuration for telemetry initialization.
pub struct TelemetryConfig {
    /// Fallback filter directive when `RUST_LOG` is unset (e.g. "info").
    pub log_level: String,
    /// Compact single-line output instead of the full format.
    pub compact: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            compact: false,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid or a subscriber was
/// already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<()> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .map_err(|e| Error::Config(format!("invalid log level {}: {e}", config.log_level)))?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.compact {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| Error::Other(format!("failed to init tracing subscriber: {e}")))
}
