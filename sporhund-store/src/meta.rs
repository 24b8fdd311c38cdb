//! Store metadata sidecars.
//!
//! Each store keeps a small `<store>.meta.json` next to the data file with
//! its last-modification time and the aggregation high-water mark. The
//! modification time feeds signature-set cache tags; the high-water mark
//! lets an aggregation pass skip alarms it has already folded in.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreMeta {
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_agg_update: Option<DateTime<Utc>>,
}

pub(crate) fn meta_path(store_path: &Path) -> PathBuf {
    let mut name = store_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".meta.json");
    store_path.with_file_name(name)
}

pub(crate) fn read_meta(store_path: &Path) -> Result<StoreMeta, StoreError> {
    let path = meta_path(store_path);
    match fs::read_to_string(&path) {
        Ok(text) => Ok(serde_json::from_str(&text)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(StoreMeta::default()),
        Err(err) => Err(err.into()),
    }
}

pub(crate) fn write_meta(store_path: &Path, meta: &StoreMeta) -> Result<(), StoreError> {
    let path = meta_path(store_path);
    let tmp = meta_path(store_path).with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(meta)?)?;
    fs::rename(&tmp, &path)?;
    Ok(())
}
