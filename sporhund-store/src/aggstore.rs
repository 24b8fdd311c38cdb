//! JSON-lines store for aggregate roll-up buckets.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use sporhund_alarm::AggregateDoc;

use crate::error::StoreError;

pub struct AggregateStore {
    path: PathBuf,
}

impl AggregateStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Vec<AggregateDoc>, StoreError> {
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

    /// Replace the store's contents with `docs`.
    pub fn save_all(&self, docs: &[AggregateDoc]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut writer = BufWriter::new(fs::File::create(&tmp)?);
            for doc in docs {
                serde_json::to_writer(&mut writer, doc)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
