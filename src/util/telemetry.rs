//! Telemetry helpers for structured logging and tracing.

/// Initialize tracing/telemetry from the environment. Users can install
/// their own subscriber; this helper installs a default env-based subscriber
/// if none is set.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Initialize tracing with an explicit filter directive, e.g. `"debug"` or
/// `"queueless_pool=trace"`. Intended for tests and local runs where the
/// environment is not set up.
pub fn init_tracing_with(filter: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
}
