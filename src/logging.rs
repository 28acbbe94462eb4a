//! Diagnostics go to stderr so stdout stays usable by the shell integration.

use std::io;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT_ONCE: Once = Once::new();

/// Default filter directive for a `-v` count.
fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "cortex=warn",
        1 => "cortex=info",
        _ => "cortex=debug",
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over `verbosity`.
pub fn init(verbosity: u8) {
    INIT_ONCE.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(false)
            .init();
    });
}
