//! Compiled signatures: prefilter + kind-specific verifier.
//!
//! A signature's prefilter is a fixed string that must occur in any text the
//! signature matches; it has zero false negatives and is what the
//! multi-pattern automaton scans for. The verifier confirms a prefilter hit,
//! rejecting over-matches such as `192.168.1.1` occurring inside
//! `192.168.1.11`, and for ranges extends the hit to the full IP token.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use chrono::{DateTime, TimeZone, Utc};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use crate::classify::{self, classify, SignatureType};
use crate::error::SignatureError;
use crate::id::Digest;

/// Kind-specific verifier data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureKind {
    Ip(u32),
    Cidr { start: u32, stop: u32 },
    IpRange { start: u32, stop: u32 },
    Domain(String),
    FixedString(String),
}

impl SignatureKind {
    pub fn type_tag(&self) -> SignatureType {
        match self {
            Self::Ip(_) => SignatureType::Ip,
            Self::Cidr { .. } => SignatureType::Cidr,
            Self::IpRange { .. } => SignatureType::IpRange,
            Self::Domain(_) => SignatureType::Domain,
            Self::FixedString(_) => SignatureType::FixedString,
        }
    }
}

/// Outcome of confirming a prefilter hit.
///
/// Verifiers never unwind: rejection is an ordinary value on the hot scan
/// path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The hit is a true match over `line[start..stop]`. `stop` may extend
    /// past the prefilter hit (range kinds claim the whole IP token).
    Accept { start: usize, stop: usize },
    Reject,
}

/// Per-source metadata attached to a signature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureSource {
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub comment: String,
}

/// A compiled detector for one class of tokens.
#[derive(Debug, Clone)]
pub struct Signature {
    id: Digest,
    text: String,
    kind: SignatureKind,
    prefilter: String,

    pub active: bool,
    pub tuned: bool,
    pub white_conflict: bool,
    pub asset_conflict: bool,

    pub enable_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub disable_time: DateTime<Utc>,

    pub sources: BTreeMap<String, SignatureSource>,
    score: f64,
}

/// Sentinel disable time for signatures that are never scheduled to expire.
pub fn never_disabled() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 0, 0, 0).unwrap()
}

impl Signature {
    /// Classify and compile `text` into a signature.
    pub fn compile(text: &str) -> Result<Self, SignatureError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SignatureError::Empty);
        }
        Self::compile_as(text, classify(text))
    }

    /// Compile `text` as a known kind, e.g. when restoring from a document.
    pub fn compile_as(text: &str, ty: SignatureType) -> Result<Self, SignatureError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SignatureError::Empty);
        }

        let (text, kind, prefilter) = match ty {
            SignatureType::Ip => {
                let value = if classify::is_exact_ip(text) {
                    classify::ipv4_value(text)
                } else {
                    None
                }
                .ok_or_else(|| SignatureError::bad(ty, text, "not an IPv4 address"))?;
                (text.to_string(), SignatureKind::Ip(value), text.to_string())
            }
            SignatureType::Cidr => {
                let net: Ipv4Network = text
                    .parse()
                    .map_err(|e: ipnetwork::IpNetworkError| SignatureError::bad(ty, text, e.to_string()))?;
                let start = u32::from(net.network());
                let stop = u32::from(net.broadcast());
                let prefilter = range_prefilter(start, stop);
                (text.to_string(), SignatureKind::Cidr { start, stop }, prefilter)
            }
            SignatureType::IpRange => {
                let caps = classify::RANGE_EXACT
                    .captures(text)
                    .ok_or_else(|| SignatureError::bad(ty, text, "not an IPv4 range"))?;
                let start = classify::ipv4_value(&caps[1])
                    .ok_or_else(|| SignatureError::bad(ty, text, "invalid range start"))?;
                let stop = classify::ipv4_value(&caps[2])
                    .ok_or_else(|| SignatureError::bad(ty, text, "invalid range stop"))?;
                if start > stop {
                    return Err(SignatureError::bad(ty, text, "range start is above its stop"));
                }
                let prefilter = range_prefilter(start, stop);
                (text.to_string(), SignatureKind::IpRange { start, stop }, prefilter)
            }
            SignatureType::Domain => {
                let normalized = text
                    .strip_suffix('.')
                    .unwrap_or(text)
                    .to_ascii_lowercase();
                if !classify::is_exact_domain(&normalized) {
                    return Err(SignatureError::bad(ty, text, "unknown TLD or malformed label"));
                }
                let kind = SignatureKind::Domain(normalized.clone());
                (normalized.clone(), kind, normalized)
            }
            SignatureType::FixedString => (
                text.to_string(),
                SignatureKind::FixedString(text.to_string()),
                text.to_string(),
            ),
        };

        let now = Utc::now();
        Ok(Self {
            id: Digest::of(&text),
            text,
            kind,
            prefilter,
            active: true,
            tuned: false,
            white_conflict: false,
            asset_conflict: false,
            enable_time: now,
            update_time: now,
            disable_time: never_disabled(),
            sources: BTreeMap::new(),
            score: 0.0,
        })
    }

    pub fn id(&self) -> Digest {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> &SignatureKind {
        &self.kind
    }

    pub fn type_tag(&self) -> SignatureType {
        self.kind.type_tag()
    }

    /// The fixed string every match of this signature must contain.
    pub fn prefilter(&self) -> &str {
        &self.prefilter
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub(crate) fn score_set(&mut self, score: f64) {
        self.score = score;
    }

    /// Recompute the score as the L2 norm of the per-source scores.
    pub fn score_recompute(&mut self) {
        self.score = self
            .sources
            .values()
            .map(|src| src.score * src.score)
            .sum::<f64>()
            .sqrt();
    }

    /// Confirm a prefilter hit over `line[start..stop]`.
    pub fn verify(&self, start: usize, stop: usize, line: &str) -> Verdict {
        let bytes = line.as_bytes();
        match &self.kind {
            SignatureKind::FixedString(_) => Verdict::Accept { start, stop },

            SignatureKind::Ip(_) => {
                // Guard against 192.168.1.1 hitting inside 192.168.1.11.
                if start > 0 && bytes[start - 1].is_ascii_digit() {
                    return Verdict::Reject;
                }
                if stop < bytes.len() && bytes[stop].is_ascii_digit() {
                    return Verdict::Reject;
                }
                Verdict::Accept { start, stop }
            }

            SignatureKind::Cidr { start: lo, stop: hi }
            | SignatureKind::IpRange { start: lo, stop: hi } => {
                if start > 0 && bytes[start - 1].is_ascii_digit() {
                    return Verdict::Reject;
                }
                // The prefilter is only a prefix of the address; parse the
                // maximal IP token at the hit and test range membership.
                let Some(token) = classify::IP_TOKEN.find(&line[start..]) else {
                    return Verdict::Reject;
                };
                match classify::ipv4_value(token.as_str()) {
                    Some(value) if (*lo..=*hi).contains(&value) => Verdict::Accept {
                        start,
                        stop: start + token.end(),
                    },
                    _ => Verdict::Reject,
                }
            }

            SignatureKind::Domain(_) => {
                // Guard against evil.com hitting inside notevil.com.
                if start > 0 && bytes[start - 1].is_ascii_alphanumeric() {
                    return Verdict::Reject;
                }
                if stop < bytes.len() && bytes[stop].is_ascii_alphanumeric() {
                    return Verdict::Reject;
                }
                Verdict::Accept { start, stop }
            }
        }
    }
}

/// Longest common prefix of the dotted-decimal forms of a range's endpoints.
fn range_prefilter(start: u32, stop: u32) -> String {
    let start = Ipv4Addr::from(start).to_string();
    let stop = Ipv4Addr::from(stop).to_string();
    start
        .bytes()
        .zip(stop.bytes())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a as char)
        .collect()
}
