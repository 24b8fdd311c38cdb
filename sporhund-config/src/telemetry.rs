//! Logging configuration.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct TelemetryConfig {
    /// Default log level when no environment filter is set.
    #[validate(custom(function = validate_log_level))]
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    if LEVELS.contains(&level) {
        Ok(())
    } else {
        Err(ValidationError::new("log_level")
            .with_message("expected one of trace, debug, info, warn, error".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_level_is_valid() {
        TelemetryConfig::default().validate().unwrap();
    }

    #[test]
    fn bogus_level_fails() {
        let config = TelemetryConfig {
            log_level: "loud".into(),
        };
        assert!(config.validate().is_err());
    }
}
