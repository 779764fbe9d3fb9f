use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. Output goes
/// to stderr so it does not interleave with the shell's stdout. Calling this
/// twice is harmless.
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
