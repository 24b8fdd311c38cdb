//! Persisted document form of a signature.
//!
//! Documents are what the signature store reads and writes. Fields the core
//! does not interpret survive a round trip untouched via the `extra` map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classify::SignatureType;
use crate::error::SignatureError;
use crate::id::Digest;
use crate::signature::{never_disabled, Signature, SignatureSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureDoc {
    pub id: Digest,
    pub sig: String,
    #[serde(rename = "type")]
    pub kind: SignatureType,
    pub fixedstring: String,

    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub tuned: bool,
    #[serde(default)]
    pub white_conflict: bool,
    #[serde(default)]
    pub asset_conflict: bool,

    #[serde(default = "Utc::now")]
    pub enable_time: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub update_time: DateTime<Utc>,
    #[serde(default = "never_disabled")]
    pub disable_time: DateTime<Utc>,

    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub sources: BTreeMap<String, SignatureSource>,

    /// Fields the core does not interpret, preserved verbatim by stores.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_active() -> bool {
    true
}

impl SignatureDoc {
    pub fn from_signature(sig: &Signature) -> Self {
        Self {
            id: sig.id(),
            sig: sig.text().to_string(),
            kind: sig.type_tag(),
            fixedstring: sig.prefilter().to_string(),
            active: sig.active,
            tuned: sig.tuned,
            white_conflict: sig.white_conflict,
            asset_conflict: sig.asset_conflict,
            enable_time: sig.enable_time,
            update_time: sig.update_time,
            disable_time: sig.disable_time,
            score: sig.score(),
            sources: sig.sources.clone(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Signature {
    /// Restore a signature from its persisted document.
    ///
    /// The verifier data is recompiled from the signature text; metadata,
    /// sources, and the stored score are taken from the document.
    pub fn from_doc(doc: &SignatureDoc) -> Result<Self, SignatureError> {
        let mut sig = Signature::compile_as(&doc.sig, doc.kind)?;
        sig.active = doc.active;
        sig.tuned = doc.tuned;
        sig.white_conflict = doc.white_conflict;
        sig.asset_conflict = doc.asset_conflict;
        sig.enable_time = doc.enable_time;
        sig.update_time = doc.update_time;
        sig.disable_time = doc.disable_time;
        sig.sources = doc.sources.clone();
        sig.score_set(doc.score);
        Ok(sig)
    }

    pub fn to_doc(&self) -> SignatureDoc {
        SignatureDoc::from_signature(self)
    }
}
