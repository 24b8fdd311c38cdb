//! Append-only JSON-lines alarm store.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use sporhund_alarm::AlarmDoc;

use crate::error::StoreError;
use crate::meta::{read_meta, write_meta};

pub struct AlarmStore {
    path: PathBuf,
}

impl AlarmStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one alarm document.
    pub fn append(&self, doc: &AlarmDoc) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_string(doc)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// All alarms, oldest first in file order.
    pub fn load(&self) -> Result<Vec<AlarmDoc>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut docs = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let doc =
                serde_json::from_str(line).map_err(|source| StoreError::InvalidDocument {
                    path: self.path.clone(),
                    line: index + 1,
                    source,
                })?;
            docs.push(doc);
        }
        Ok(docs)
    }

    /// Alarms at or after `since`.
    pub fn load_since(&self, since: DateTime<Utc>) -> Result<Vec<AlarmDoc>, StoreError> {
        let mut docs = self.load()?;
        docs.retain(|doc| doc.time >= since);
        Ok(docs)
    }

    /// High-water mark of the last aggregation pass over this store.
    pub fn last_agg_update(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(read_meta(&self.path)?.last_agg_update)
    }

    pub fn set_last_agg_update(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut meta = read_meta(&self.path)?;
        meta.last_agg_update = Some(at);
        write_meta(&self.path, &meta)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sporhund_signatures::Digest;

    fn doc(secs: i64) -> AlarmDoc {
        AlarmDoc {
            id: Digest::of(&format!("line-{secs}")),
            time: Utc.timestamp_opt(secs, 0).unwrap(),
            victim: None,
            sigs: vec![Digest::of("evil.com")],
            score: 1.0,
            data: format!("line-{secs}"),
        }
    }

    #[test]
    fn missing_store_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlarmStore::open(dir.path().join("alarms.jsonl"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn append_then_load_since() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlarmStore::open(dir.path().join("alarms.jsonl"));
        store.append(&doc(100)).unwrap();
        store.append(&doc(200)).unwrap();
        store.append(&doc(300)).unwrap();

        assert_eq!(store.load().unwrap().len(), 3);
        let since = store.load_since(Utc.timestamp_opt(200, 0).unwrap()).unwrap();
        assert_eq!(since.len(), 2);
        assert_eq!(since[0].data, "line-200");
    }

    #[test]
    fn agg_high_water_mark_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlarmStore::open(dir.path().join("alarms.jsonl"));
        assert!(store.last_agg_update().unwrap().is_none());

        let mark = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        store.set_last_agg_update(mark).unwrap();
        assert_eq!(store.last_agg_update().unwrap(), Some(mark));
    }
}
