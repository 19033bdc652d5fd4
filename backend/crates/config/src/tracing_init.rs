use tracing_subscriber::{fmt, EnvFilter};

/// Install the global fmt subscriber.
///
/// The filter comes from `RUST_LOG`, then `LOG_LEVEL`, then `default_level`.
/// Returns `false` when a subscriber was already installed (repeat calls are no-ops).
pub fn init_tracing(default_level: &str) -> bool {
    let filter = resolve_filter(default_level);

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

fn resolve_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}
