#![forbid(unsafe_code)]

//! Log output for tests and examples.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter, e.g. `LINEAGE_LOG=lineage_core=debug`.
pub const LOG_ENV: &str = "LINEAGE_LOG";

/// Install a fmt subscriber writing through the test harness.
///
/// The filter comes from [`LOG_ENV`] and defaults to `warn`. Calling it again
/// is a no-op.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
