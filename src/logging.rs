use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initializes the global tracing subscriber once.
///
/// `RUST_LOG` wins when set; otherwise `spendbook=info`, or `spendbook=debug`
/// when `verbose` is true. Logs go to stderr so command output stays clean.
pub fn init_tracing(verbose: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt};

        let default_level = if verbose { "spendbook=debug" } else { "spendbook=info" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level));

        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}
