//! Process-wide log output.
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "sheet_structure=warn";

/// Installs a stderr subscriber filtered by `RUST_LOG`, falling back to `default_filter`.
///
/// Only the first call installs a subscriber; later calls return an error
/// and leave the existing one in place.
pub fn init(default_filter: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init()
        .map_err(|e| anyhow::anyhow!("logging already initialized: {e}"))
}
