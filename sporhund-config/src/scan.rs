//! Matching-engine parameters.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct ScanConfig {
    /// Minimum prefilter length admitted into the automaton. Signatures
    /// with shorter prefilters are refused and reported.
    #[validate(range(min = 1, max = 64))]
    #[serde(default = "default_min_prefilter_len")]
    pub min_prefilter_len: usize,

    /// Directory for cached prefilter lists, named by the signature set's
    /// cache tag.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_min_prefilter_len() -> usize {
    3
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("sporhund")
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_prefilter_len: default_min_prefilter_len(),
            cache_dir: default_cache_dir(),
        }
    }
}
