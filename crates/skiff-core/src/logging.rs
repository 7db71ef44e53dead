//! Tracing subscriber setup
//!
//! Library code only emits `tracing` events. Applications embedding Skiff
//! call [`init_tracing`] once at startup to print them.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Installs a global fmt subscriber configured from `config`
///
/// `RUST_LOG` takes precedence over the configured level:
///
/// ```bash
/// RUST_LOG=skiff_core=debug,skiff_dropbox=trace my-app
/// ```
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = env_filter(&config.level);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// `RUST_LOG` if set and valid, otherwise the configured level
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
