//! Signature collections indexed by id and by prefilter.
//!
//! A `SignatureSet` is immutable for the duration of a scan. It can be built
//! from a text blob (one signature per line, `;`/`#` comments), from a file,
//! or from a stream of persisted documents; all three produce the same
//! in-memory representation.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;

use crate::doc::SignatureDoc;
use crate::error::SignatureError;
use crate::id::Digest;
use crate::signature::Signature;

/// Which signatures participate in a scan.
///
/// The default admits `active ∧ ¬white_conflict ∧ ¬asset_conflict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanFilter {
    pub require_active: bool,
    pub allow_white_conflict: bool,
    pub allow_asset_conflict: bool,
}

impl Default for ScanFilter {
    fn default() -> Self {
        Self {
            require_active: true,
            allow_white_conflict: false,
            allow_asset_conflict: false,
        }
    }
}

impl ScanFilter {
    /// A filter that admits every signature in the set.
    pub fn all() -> Self {
        Self {
            require_active: false,
            allow_white_conflict: true,
            allow_asset_conflict: true,
        }
    }

    pub fn admits(&self, sig: &Signature) -> bool {
        (!self.require_active || sig.active)
            && (self.allow_white_conflict || !sig.white_conflict)
            && (self.allow_asset_conflict || !sig.asset_conflict)
    }
}

/// Where a set's contents came from; feeds `cache_tag()`.
#[derive(Debug, Clone)]
enum Provenance {
    Text { digest: Digest },
    File { path: PathBuf, mtime: SystemTime },
    Docs { source: String },
}

impl Provenance {
    fn tag(&self) -> String {
        let identity = match self {
            Self::Text { digest } => format!("text:{digest}"),
            Self::File { path, mtime } => format!("file:{}:{mtime:?}", path.display()),
            Self::Docs { source } => format!("docs:{source}"),
        };
        Digest::of(&identity).to_string()
    }
}

/// An id- and prefilter-indexed collection of signatures.
#[derive(Debug)]
pub struct SignatureSet {
    sigs: Vec<Signature>,
    by_id: HashMap<Digest, usize>,
    by_prefilter: HashMap<String, Vec<usize>>,
    provenance: Provenance,
}

impl SignatureSet {
    fn empty(provenance: Provenance) -> Self {
        Self {
            sigs: Vec::new(),
            by_id: HashMap::new(),
            by_prefilter: HashMap::new(),
            provenance,
        }
    }

    /// Parse a text blob, one signature per line.
    ///
    /// Lines are trimmed, then truncated at the first `;` or `#`; empty
    /// results are skipped. Unparseable signatures are logged and omitted,
    /// never fatal to the set. Duplicates (same id) are silently coalesced.
    pub fn from_text(text: &str) -> Self {
        let mut set = Self::empty(Provenance::Text {
            digest: Digest::of(text),
        });
        set.parse_lines(text.lines());
        set
    }

    /// Read a signature file, same line format as [`SignatureSet::from_text`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SignatureError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mtime = fs::metadata(path)?.modified()?;
        let mut set = Self::empty(Provenance::File {
            path: path.to_path_buf(),
            mtime,
        });
        set.parse_lines(text.lines());
        Ok(set)
    }

    /// Rebuild a set from persisted documents.
    ///
    /// `source` identifies the backing store and its modification state; it
    /// is folded into [`SignatureSet::cache_tag`].
    pub fn from_docs(docs: impl IntoIterator<Item = SignatureDoc>, source: &str) -> Self {
        let mut set = Self::empty(Provenance::Docs {
            source: source.to_string(),
        });
        for doc in docs {
            match Signature::from_doc(&doc) {
                Ok(sig) => set.add(sig),
                Err(err) => warn!(sig = %doc.sig, %err, "skipping bad signature document"),
            }
        }
        set
    }

    fn parse_lines<'a>(&mut self, lines: impl Iterator<Item = &'a str>) {
        for line in lines {
            let Some(text) = signature_line(line) else {
                continue;
            };
            match Signature::compile(text) {
                Ok(sig) => self.add(sig),
                Err(err) => warn!(sig = text, %err, "skipping bad signature"),
            }
        }
    }

    /// Insert a signature, indexing it by id and by prefilter.
    pub fn add(&mut self, sig: Signature) {
        if self.by_id.contains_key(&sig.id()) {
            return;
        }
        let index = self.sigs.len();
        self.by_id.insert(sig.id(), index);
        self.by_prefilter
            .entry(sig.prefilter().to_string())
            .or_default()
            .push(index);
        self.sigs.push(sig);
    }

    pub fn get_by_id(&self, id: &Digest) -> Option<&Signature> {
        self.by_id.get(id).map(|&i| &self.sigs[i])
    }

    /// All signatures sharing `prefilter` (one prefilter may be shared by
    /// many signatures).
    pub fn get_by_prefilter<'a>(&'a self, prefilter: &str) -> impl Iterator<Item = &'a Signature> {
        self.by_prefilter
            .get(prefilter)
            .into_iter()
            .flatten()
            .map(|&i| &self.sigs[i])
    }

    /// Distinct prefilter strings of the signatures admitted by `filter`.
    pub fn prefilters(&self, filter: ScanFilter) -> BTreeSet<String> {
        self.sigs
            .iter()
            .filter(|sig| filter.admits(sig))
            .map(|sig| sig.prefilter().to_string())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.sigs.iter()
    }

    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }

    /// Recompute every signature's score from its sources.
    pub fn scores_recompute(&mut self) {
        for sig in &mut self.sigs {
            sig.score_recompute();
        }
    }

    /// Opaque tag identifying the set's effective contents and source.
    ///
    /// Changes whenever the backing text, file, or store changes; callers
    /// use it to name on-disk caches of the compiled prefilter list.
    pub fn cache_tag(&self) -> String {
        self.provenance.tag()
    }
}

/// Extract the signature text from one line of a signature file.
fn signature_line(line: &str) -> Option<&str> {
    let end = line.find([';', '#']).unwrap_or(line.len());
    let text = line[..end].trim();
    (!text.is_empty()).then_some(text)
}
