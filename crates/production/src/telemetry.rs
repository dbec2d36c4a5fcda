//! Tracing initialization.

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,ibft=debug";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to set global subscriber: {0}")]
    SetSubscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`, which falls back to
/// [`DEFAULT_FILTER`].
pub fn init_tracing(default_filter: Option<&str>) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.unwrap_or(DEFAULT_FILTER)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_subscriber_is_installed_once() {
        // Another test in this binary may already own the global subscriber.
        let _ = init_tracing(Some("debug"));
        assert!(matches!(
            init_tracing(None),
            Err(TelemetryError::SetSubscriber(_))
        ));
    }
}
