//! Logging setup for Coronet binaries and tests.
//!
//! All runtime logging goes through `tracing`; this crate only owns the
//! subscriber configuration so every binary initializes it the same way.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global subscriber from `RUST_LOG`, defaulting to `info`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    init_with_filter("info");
}

/// Initialize the global subscriber with an explicit default filter,
/// still overridable through `RUST_LOG`.
pub fn init_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_init_is_harmless() {
        init();
        init();
    }
}
