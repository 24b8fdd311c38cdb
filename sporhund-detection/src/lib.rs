//! # sporhund-detection
//!
//! The two-stage matching pipeline: an Aho-Corasick automaton scans each
//! line against every signature's prefilter in one pass, and each hit is
//! confirmed by the owning signature's verifier.
//!
//! ### Expectations:
//! - One automaton pass per line regardless of signature count
//! - Matching is O(|line| + hits); construction linear in total prefilter size
//! - Verifiers are pure; rejection never unwinds

pub mod cache;
pub mod engine;
pub mod error;
pub mod input;
pub mod prefilter;

pub use cache::PrefilterCache;
pub use engine::{LineMatches, Match, MatchingEngine, ScanStream, MIN_PREFILTER_LEN};
pub use error::ScanError;
pub use input::LogInput;
pub use prefilter::{PrefilterHit, PrefilterIndex};
