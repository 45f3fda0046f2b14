use std::sync::Once;

static INIT: Once = Once::new();

/// Install the tracing subscriber used by Keel's tests.
///
/// Output is only produced when the tests were built with the `DEBUG`
/// environment variable set. The filter comes from `RUST_LOG` and
/// defaults to `trace` for Keel's crates.
pub fn setup_test_log() {
    INIT.call_once(|| {
        color_backtrace::install();
        if option_env!("DEBUG").is_none() {
            return;
        }

        use tracing_subscriber::{fmt, prelude::*, EnvFilter};
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("keel=trace,keel_kv_store=trace"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_test_writer()
                    .with_line_number(true)
                    .with_file(true),
            )
            .try_init();
    });
}
