use tracing_subscriber::EnvFilter;

/// Initialize tracing to stderr. `RUST_LOG` overrides the configured level.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .init();

    tracing::debug!(target: "system", "tracing initialized");
}
