use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "drivedesk=info";

/// Installs the global fmt subscriber writing to stderr.
///
/// `RUST_LOG` wins over `directive`; an unparsable directive falls back to
/// [`DEFAULT_LOG_FILTER`].
pub fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
