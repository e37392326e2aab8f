//! Log subscriber setup.

use tracing_subscriber::EnvFilter;
use warden_config::TelemetryConfig;

use crate::{Result, WardenError};

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` wins over the configured filter. Fails if a global subscriber
/// is already installed or the filter does not parse.
pub fn init(config: &TelemetryConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| WardenError::Configuration(format!("invalid log filter: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| WardenError::Configuration(format!("cannot install subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_filter() {
        let config = TelemetryConfig {
            filter: "warden=[".to_string(),
        };
        // Only meaningful when RUST_LOG is unset in the test environment.
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(matches!(init(&config), Err(WardenError::Configuration(_))));
        }
    }
}
