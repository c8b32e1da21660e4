//! Process-wide tracing setup.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Logs go to stderr so command output on stdout stays parseable.
pub fn init(config: &LogConfig, level_override: Option<&str>) {
    let level = level_override.unwrap_or(&config.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // try_init: a subscriber may already be installed.
    if config.json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.compact().with_target(false).try_init();
    }
}
