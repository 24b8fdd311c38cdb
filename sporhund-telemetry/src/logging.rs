//! Structured logging with tracing.
//!
//! The environment filter wins when set (`RUST_LOG`), otherwise the level
//! from configuration applies.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub struct ScanLogger;

impl ScanLogger {
    /// Install the global subscriber. Call once at startup.
    pub fn init(default_level: &str) {
        let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

        let filter_layer = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn events_are_captured() {
        tracing::info!(sig = "evil.com", "signature refused");
        assert!(logs_contain("signature refused"));
    }
}
