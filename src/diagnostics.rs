// Logging setup shared by the shell and the test suites.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Installs a stderr subscriber filtered by `RUST_LOG`, falling back to `default_level`.
/// Only the first call (of this or [`init_for_tests`]) has an effect.
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter(default_level))
            .with_thread_names(true)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

/// Same as [`init`] but routed through the libtest capture.
pub fn init_for_tests() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter("warn"))
            .with_thread_names(true)
            .with_test_writer()
            .try_init();
    });
}

/// Maps the shell's numeric `--debug=N` flag to a filter directive.
pub fn level_from_u8(level: u8) -> &'static str {
    match level {
        0 => "off",
        1 => "error",
        2 => "info",
        3 => "debug",
        _ => "trace",
    }
}
