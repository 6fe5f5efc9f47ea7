use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Filter resolution order: `SUPERAGENT_LOG`, then `RUST_LOG`, then the config file.
fn resolve_env_filter(config: &LogConfig) -> EnvFilter {
    if let Ok(level) = std::env::var("SUPERAGENT_LOG") {
        if let Ok(filter) = EnvFilter::try_new(level) {
            return filter;
        }
    }
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the stderr subscriber. Later calls are no-ops.
///
/// Logs go to stderr so streamed answers on stdout stay clean.
pub fn init(config: &LogConfig) {
    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = tracing_subscriber::registry()
        .with(resolve_env_filter(config))
        .with(console_layer)
        .try_init();
}
