//! Signature source configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Where a signature set comes from: an inline text blob, a signature file,
/// or a document store. At most one may be set.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = validate_single_source))]
pub struct SourceConfig {
    /// Inline signatures, one per line.
    #[serde(default)]
    pub inline: Option<String>,

    /// Signature file, one signature per line with `;`/`#` comments.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// JSON-lines signature document store.
    #[serde(default)]
    pub store: Option<PathBuf>,
}

impl SourceConfig {
    pub fn is_configured(&self) -> bool {
        self.inline.is_some() || self.file.is_some() || self.store.is_some()
    }
}

fn validate_single_source(config: &SourceConfig) -> Result<(), ValidationError> {
    let configured = [
        config.inline.is_some(),
        config.file.is_some(),
        config.store.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count();
    if configured > 1 {
        return Err(ValidationError::new("multiple_sources")
            .with_message("set at most one of inline, file, store".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_source_is_valid() {
        SourceConfig::default().validate().unwrap();
    }

    #[test]
    fn single_source_is_valid() {
        let config = SourceConfig {
            file: Some("black.sigs".into()),
            ..Default::default()
        };
        config.validate().unwrap();
        assert!(config.is_configured());
    }

    #[test]
    fn two_sources_fail_validation() {
        let config = SourceConfig {
            file: Some("black.sigs".into()),
            store: Some("black.jsonl".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
