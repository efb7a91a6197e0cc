use std::env;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter directive: `WC26_LOG`, then `RUST_LOG`, then `warn` (`debug` when verbose).
pub fn filter_directive(verbose: bool) -> String {
    env::var("WC26_LOG")
        .ok()
        .or_else(|| env::var("RUST_LOG").ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| if verbose { "debug" } else { "warn" }.to_string())
}

/// Installs the stderr fmt subscriber for binaries. A second call is a no-op.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_new(filter_directive(verbose))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
