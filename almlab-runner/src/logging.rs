//! Structured logging setup.
//!
//! `RUST_LOG` wins when set; otherwise the verbosity count picks the level
//! for the almlab crates and everything else stays at `warn`.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Default directive for a `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn,almlab_core=info,almlab_runner=info",
        1 => "warn,almlab_core=debug,almlab_runner=debug",
        _ => "warn,almlab_core=trace,almlab_runner=trace",
    }
}

/// Install the global fmt subscriber. Later calls are no-ops.
pub fn init_tracing(verbosity: u8) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
        let installed = tracing_subscriber::fmt()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .try_init();
        if installed.is_ok() {
            tracing::debug!(verbosity, "logging initialized");
        }
    });
}
