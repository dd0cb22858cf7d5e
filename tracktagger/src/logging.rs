//! Diagnostic logging setup.
//!
//! Logs go to stderr so they never mix with the track map printed on
//! stdout. `RUST_LOG` overrides the level chosen here.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Level used without `--verbose`.
pub const DEFAULT_LEVEL: &str = "warn";

/// Level used with `--verbose`.
pub const VERBOSE_LEVEL: &str = "debug";

/// Filter directive for the given verbosity.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_LEVEL
    } else {
        DEFAULT_LEVEL
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(verbose: bool) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

        let installed = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(verbose))
            .try_init();
        if installed.is_err() {
            // Another subscriber was set first, e.g. by a test harness.
            tracing::debug!("Global subscriber already installed");
        }
    });
}
