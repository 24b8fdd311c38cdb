//! # sporhund-signatures
//!
//! Signature model for the sporhund log scanner: classification of textual
//! signatures into semantic kinds, compilation into prefilter + verifier
//! pairs, and the `SignatureSet` collection the matching engine scans with.
//!
//! ### Components:
//! - `classify`: anchored kind detection (IPRange, CIDR, IP, Domain, FixedString)
//! - `signature`: compiled `Signature` with kind-tagged verifier data
//! - `set`: id/prefilter-indexed `SignatureSet` with text, file, and document constructions
//! - `doc`: persisted document form of a signature

pub mod classify;
pub mod doc;
pub mod error;
pub mod id;
pub mod set;
pub mod signature;
pub mod tld;

pub use classify::{classify, SignatureType};
pub use doc::SignatureDoc;
pub use error::SignatureError;
pub use id::Digest;
pub use set::{ScanFilter, SignatureSet};
pub use signature::{Signature, SignatureKind, SignatureSource, Verdict};

/// Stable identity of a signature: the SHA-224 digest of its canonical text.
pub type SigId = Digest;
