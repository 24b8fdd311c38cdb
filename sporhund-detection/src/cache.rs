//! On-disk cache of compiled prefilter lists.
//!
//! Cache files are named by the owning set's cache tag, so a stale cache is
//! simply never looked up again. Writers go through a `.tmp` sibling and an
//! atomic rename; a partial cache never appears under the final name.

use std::collections::BTreeSet;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::error::ScanError;

pub struct PrefilterCache {
    dir: PathBuf,
}

impl PrefilterCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load the prefilter list cached under `tag`, if any.
    pub fn load(&self, tag: &str) -> Result<Option<Vec<String>>, ScanError> {
        let path = self.dir.join(tag);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text.lines().map(str::to_string).collect())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Persist a prefilter list under `tag`.
    pub fn store(&self, tag: &str, prefilters: &BTreeSet<String>) -> Result<(), ScanError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(tag);
        let tmp = self.dir.join(format!("{tag}.tmp"));
        {
            let mut writer = BufWriter::new(fs::File::create(&tmp)?);
            for prefilter in prefilters {
                writeln!(writer, "{prefilter}")?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tag_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PrefilterCache::new(dir.path());
        assert!(cache.load("nothing-here").unwrap().is_none());
    }

    #[test]
    fn store_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PrefilterCache::new(dir.path());
        let prefilters: BTreeSet<String> =
            ["evil.com", "192.168.1."].map(|s| s.to_string()).into();
        cache.store("tag-a", &prefilters).unwrap();

        let loaded = cache.load("tag-a").unwrap().unwrap();
        assert_eq!(loaded, vec!["192.168.1.".to_string(), "evil.com".to_string()]);
    }

    #[test]
    fn no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PrefilterCache::new(dir.path());
        let prefilters: BTreeSet<String> = [String::from("evil.com")].into();
        cache.store("tag-b", &prefilters).unwrap();
        assert!(dir.path().join("tag-b").exists());
        assert!(!dir.path().join("tag-b.tmp").exists());
    }
}
