//! Tracing setup for applications embedding the template engine.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RUST_LOG` | Filter directives, overrides `logging.level` | unset |
//! | `TEMPLATES__LOGGING__LEVEL` | Fallback filter when `RUST_LOG` is unset | `info` |
//! | `TEMPLATES__LOGGING__JSON` | Emit JSON lines | `false` |

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Result type for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Telemetry-specific error type
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Invalid log filter '{0}'")]
    InvalidFilter(String),
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Build the filter, preferring `RUST_LOG` over the configured level
pub fn env_filter(config: &LoggingConfig) -> TelemetryResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|_| TelemetryError::InvalidFilter(config.level.clone())),
    }
}

/// Install the global tracing subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> TelemetryResult<()> {
    let filter = env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    tracing::info!(level = %config.level, json = config.json, "Tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_rejected() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LoggingConfig {
            level: "ara_template_engine=loudest".to_string(),
            json: false,
        };
        assert!(matches!(env_filter(&config), Err(TelemetryError::InvalidFilter(_))));
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig::default();
        let _ = init_tracing(&config);
        assert!(matches!(
            init_tracing(&config),
            Err(TelemetryError::SubscriberInit(_))
        ));
    }
}
