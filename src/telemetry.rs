use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber, logging to stderr
///
/// `RUST_LOG` takes precedence over `default_filter`.
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
