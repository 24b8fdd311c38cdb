//! # sporhund-telemetry
//!
//! Logging and metrics for the scanner.

pub mod logging;
pub mod metrics;

pub use logging::ScanLogger;
pub use metrics::MetricsRecorder;
