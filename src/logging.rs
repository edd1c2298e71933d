use std::io;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Installs the global `tracing` subscriber: pretty output in debug builds,
/// JSON in release, filter taken from `RUST_LOG` when set. Log lines go to
/// stderr so stdout stays free for machine-readable output.
///
/// Binaries call this once at startup. The library never installs a
/// subscriber on its own, so embedding applications keep control of theirs.
pub fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if cfg!(debug_assertions) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(io::stderr)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .with_target(false)
            .with_writer(io::stderr)
            .try_init();
    }
}
