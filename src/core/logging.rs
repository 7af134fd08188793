//! Tracing subscriber setup.

use crate::core::config::LoggingConfig;
use crate::core::{Result, TesseraError};

/// Initialize logging based on configuration.
///
/// `RUST_LOG` wins when set, then `TESSERA_LOG_LEVEL`, then the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let log_level = std::env::var("TESSERA_LOG_LEVEL")
        .unwrap_or_else(|_| config.level.as_str().to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let fmt_layer = if config.structured {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .compact()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).compact()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TesseraError::config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}
