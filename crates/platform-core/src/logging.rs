use tracing_subscriber::EnvFilter;

/// Initializes the process-wide tracing subscriber. Called once from each
/// service's `main()`; never exposed as ambient global state beyond what
/// `tracing`'s own dispatcher owns.
pub fn init(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
