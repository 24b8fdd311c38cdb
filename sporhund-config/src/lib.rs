//! # sporhund-config
//!
//! Hierarchical configuration for the sporhund scanner.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in defaults
//! 2. `config/sporhund.yaml`, when present
//! 3. `SPORHUND_*` environment variables (`__` separates nesting)

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod alarms;
mod error;
mod scan;
mod sources;
mod telemetry;

pub use alarms::AlarmsConfig;
pub use error::ConfigError;
pub use scan::ScanConfig;
pub use sources::SourceConfig;
pub use telemetry::TelemetryConfig;

/// Top-level configuration container.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Default)]
pub struct SporhundConfig {
    /// Matching-engine parameters.
    #[validate(nested)]
    pub scan: ScanConfig,

    /// Where the scanned ("black") signatures come from.
    #[validate(nested)]
    pub signatures: SourceConfig,

    /// Optional asset signatures used for victim lookup.
    #[validate(nested)]
    pub assets: SourceConfig,

    /// Alarm persistence and aggregation.
    #[validate(nested)]
    pub alarms: AlarmsConfig,

    /// Logging configuration.
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl SporhundConfig {
    /// Load configuration from the default file and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let figment = Figment::from(Serialized::defaults(SporhundConfig::default()));
        let figment = if Path::new("config/sporhund.yaml").exists() {
            figment.merge(Yaml::file("config/sporhund.yaml"))
        } else {
            figment
        };
        Self::extract(figment)
    }

    /// Load configuration from a specific file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let figment = Figment::from(Serialized::defaults(SporhundConfig::default()))
            .merge(Yaml::file(path));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .merge(Env::prefixed("SPORHUND_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        let config = SporhundConfig::default();
        config.validate().expect("default config should be valid");
        assert_eq!(config.scan.min_prefilter_len, 3);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = SporhundConfig::load_from_path("/no/such/sporhund.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn yaml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "scan:\n  min_prefilter_len: 5\nalarms:\n  save: true\n"
        )
        .unwrap();
        let config = SporhundConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.scan.min_prefilter_len, 5);
        assert!(config.alarms.save);
    }

    #[test]
    fn out_of_range_prefilter_len_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scan:\n  min_prefilter_len: 0\n").unwrap();
        let err = SporhundConfig::load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
