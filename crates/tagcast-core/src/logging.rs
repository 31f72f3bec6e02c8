//! `tracing` subscriber setup shared by the binaries.
//!
//! Libraries only emit `tracing` events; binaries call [`init_subscriber`]
//! once at startup. `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::EnvFilter;

/// Install a compact stderr subscriber filtered at `level`.
///
/// Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// Install a JSON-lines stderr subscriber filtered at `level`.
///
/// Used when logs are shipped to a collector instead of read by a human.
pub fn init_json_subscriber(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_does_not_panic() {
        init_subscriber("warn");
        init_subscriber("debug");
        init_json_subscriber("info");
    }
}
