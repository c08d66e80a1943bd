//! Subscriber setup for binaries and tests embedding histdb.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Environment variable overriding the configured filter.
pub const LOG_ENV_VAR: &str = "HISTDB_LOG";

/// Install a global fmt subscriber. Returns `false` if one was already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let builder = fmt().with_env_filter(filter).with_target(true);
    if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
