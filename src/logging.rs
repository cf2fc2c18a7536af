//! Logging initialization helper

use tracing_subscriber::EnvFilter;

/// Initialize tracing with `RUST_LOG` or the given default filter.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
