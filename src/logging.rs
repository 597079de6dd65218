//! Tracing subscriber bootstrap for embedding shells.

/// Install a formatted subscriber with env-filter support, defaulting to
/// `INFO`. Call once at startup; later calls are ignored.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .try_init();
}
