use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "service_orders=info";

/// Installs a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `service_orders=info`. Calling it again is harmless.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
