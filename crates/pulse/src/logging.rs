//! Logging system setup.

use crate::config::LoggingSettings;
use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set.
///
/// # Arguments
/// * `settings` - Level and output format
pub fn setup_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);

    if settings.json_format {
        registry
            .with(fmt::layer().json().with_target(false).with_thread_names(true))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_names(true))
            .try_init()?;
    }

    Ok(())
}
