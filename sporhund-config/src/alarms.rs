//! Alarm persistence and aggregation configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct AlarmsConfig {
    /// Persist alarms for matched lines.
    #[serde(default)]
    pub save: bool,

    /// JSON-lines alarm store.
    #[serde(default = "default_store")]
    pub store: PathBuf,

    /// Hourly roll-up store.
    #[serde(default = "default_agg_hour")]
    pub aggregates_hour: PathBuf,

    /// Daily roll-up store.
    #[serde(default = "default_agg_day")]
    pub aggregates_day: PathBuf,
}

fn default_store() -> PathBuf {
    PathBuf::from("alarms.jsonl")
}

fn default_agg_hour() -> PathBuf {
    PathBuf::from("alarms_agg_hour.jsonl")
}

fn default_agg_day() -> PathBuf {
    PathBuf::from("alarms_agg_day.jsonl")
}

impl Default for AlarmsConfig {
    fn default() -> Self {
        Self {
            save: false,
            store: default_store(),
            aggregates_hour: default_agg_hour(),
            aggregates_day: default_agg_day(),
        }
    }
}
