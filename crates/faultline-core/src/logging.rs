//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Initialize logging from the `FAULTLINE_LOG` environment variable.
///
/// Format: `FAULTLINE_LOG=faultline_explore=debug,faultline_store=info`.
/// Falls back to `faultline=info` when unset or invalid. Only the first call
/// has an effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("FAULTLINE_LOG").unwrap_or_else(|_| EnvFilter::new("faultline=info"));
        install(filter);
    });
}

/// Initialize logging with an explicit filter, ignoring the environment.
pub fn init_tracing_with_filter(directives: &str) {
    INIT.call_once(|| install(EnvFilter::new(directives)));
}

fn install(filter: EnvFilter) {
    // Another subscriber may already be installed by an embedding program.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}
