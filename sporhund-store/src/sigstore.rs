//! JSON-lines signature store.
//!
//! One signature document per line, the same document shape a document
//! database would hold. Fields the core does not interpret are preserved
//! verbatim across rewrites.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use sporhund_signatures::{Signature, SignatureDoc, SignatureSet};

use crate::error::StoreError;
use crate::meta::{read_meta, write_meta};

pub struct SignatureStore {
    path: PathBuf,
}

impl SignatureStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All documents in the store.
    pub fn load_docs(&self) -> Result<Vec<SignatureDoc>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.clone()))
            }
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

    /// Documents carrying metadata from `source`.
    pub fn load_docs_from_source(&self, source: &str) -> Result<Vec<SignatureDoc>, StoreError> {
        let mut docs = self.load_docs()?;
        docs.retain(|doc| doc.sources.contains_key(source));
        Ok(docs)
    }

    /// Build a signature set from the store's current contents.
    ///
    /// The set's cache tag is derived from the store's path and its
    /// last-update metadata, so it changes whenever the store does.
    pub fn load_set(&self) -> Result<SignatureSet, StoreError> {
        let docs = self.load_docs()?;
        debug!(path = %self.path.display(), docs = docs.len(), "loaded signature store");
        Ok(SignatureSet::from_docs(docs, &self.cache_source()?))
    }

    /// Insert or replace one signature, stamping its update time and the
    /// store's last-update metadata.
    pub fn save(&self, sig: &Signature) -> Result<(), StoreError> {
        let mut doc = sig.to_doc();
        doc.update_time = Utc::now();
        self.save_doc(doc)
    }

    /// Insert or replace one document by id.
    pub fn save_doc(&self, doc: SignatureDoc) -> Result<(), StoreError> {
        let mut docs = match self.load_docs() {
            Ok(docs) => docs,
            Err(StoreError::NotFound(_)) => Vec::new(),
            Err(err) => return Err(err),
        };
        match docs.iter_mut().find(|existing| existing.id == doc.id) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
        self.rewrite(&docs)?;

        let mut meta = read_meta(&self.path)?;
        meta.last_update = Some(Utc::now());
        write_meta(&self.path, &meta)?;
        Ok(())
    }

    fn rewrite(&self, docs: &[SignatureDoc]) -> Result<(), StoreError> {
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

    /// Identity string folded into the signature set's cache tag.
    pub fn cache_source(&self) -> Result<String, StoreError> {
        let meta = read_meta(&self.path)?;
        Ok(format!(
            "{}:{}",
            self.path.display(),
            meta.last_update.map(|t| t.to_rfc3339()).unwrap_or_default()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sporhund_signatures::{Digest, SignatureSource};

    fn store_in(dir: &tempfile::TempDir) -> SignatureStore {
        SignatureStore::open(dir.path().join("black.jsonl"))
    }

    #[test]
    fn missing_store_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            store_in(&dir).load_docs(),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn save_and_reload_a_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut sig = Signature::compile("evil.com").unwrap();
        sig.sources.insert(
            "feed".into(),
            SignatureSource {
                score: 50.0,
                ..Default::default()
            },
        );
        sig.score_recompute();
        store.save(&sig).unwrap();
        store.save(&Signature::compile("192.168.1.0/24").unwrap()).unwrap();

        let set = store.load_set().unwrap();
        assert_eq!(set.len(), 2);
        let evil = set.get_by_id(&Digest::of("evil.com")).unwrap();
        assert!((evil.score() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn save_replaces_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut sig = Signature::compile("evil.com").unwrap();
        store.save(&sig).unwrap();
        sig.active = false;
        store.save(&sig).unwrap();

        let docs = store.load_docs().unwrap();
        assert_eq!(docs.len(), 1);
        assert!(!docs[0].active);
    }

    #[test]
    fn extra_fields_survive_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut doc = Signature::compile("evil.com").unwrap().to_doc();
        doc.extra.insert("analyst_note".into(), "watch this".into());
        store.save_doc(doc).unwrap();
        store.save(&Signature::compile("good.net").unwrap()).unwrap();

        let docs = store.load_docs().unwrap();
        let evil = docs.iter().find(|d| d.sig == "evil.com").unwrap();
        assert_eq!(evil.extra["analyst_note"], "watch this");
    }

    #[test]
    fn cache_source_tracks_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let before = store.cache_source().unwrap();
        store.save(&Signature::compile("evil.com").unwrap()).unwrap();
        let after = store.cache_source().unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn source_filtered_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut tagged = Signature::compile("evil.com").unwrap();
        tagged
            .sources
            .insert("osint".into(), SignatureSource::default());
        store.save(&tagged).unwrap();
        store.save(&Signature::compile("good.net").unwrap()).unwrap();

        let docs = store.load_docs_from_source("osint").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].sig, "evil.com");
    }
}
