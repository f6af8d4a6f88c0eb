//! # Structured Logging
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` wins when set; otherwise the
//! configured level is used as the filter directive. Output goes to stderr so the
//! interactive driver keeps stdout for its own prompts.

use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::core::error::{BalancerError, BalancerResult};
use crate::observability::config::{LogConfig, LogFormat};

/// Build the filter: `RUST_LOG` if present, the configured directive otherwise
pub fn build_filter(config: &LogConfig) -> BalancerResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            BalancerError::config(format!("Invalid log level '{}': {}", config.level, e))
        }),
    }
}

/// Initialize the global subscriber
///
/// Calling this again after a subscriber is installed logs a warning and returns `Ok`.
pub fn init_logging(config: &LogConfig) -> BalancerResult<()> {
    let env_filter = build_filter(config)?;

    let result = match config.format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if result.is_err() {
        warn!("Tracing subscriber already initialized, skipping initialization");
        return Ok(());
    }

    info!(level = %config.level, format = ?config.format, "Structured logging initialized");
    Ok(())
}
