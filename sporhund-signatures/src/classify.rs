//! Anchored classification of textual signatures.
//!
//! The first matching kind wins, in this order: IPRange, CIDR, IP, Domain.
//! Anything that matches none of them is a fixed string.

use std::fmt;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::tld;

/// Semantic kind of a signature, as carried in persisted documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureType {
    #[serde(rename = "IP")]
    Ip,
    #[serde(rename = "CIDR")]
    Cidr,
    #[serde(rename = "IPRange")]
    IpRange,
    Domain,
    FixedString,
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ip => "IP",
            Self::Cidr => "CIDR",
            Self::IpRange => "IPRange",
            Self::Domain => "Domain",
            Self::FixedString => "FixedString",
        };
        f.write_str(name)
    }
}

const OCTET: &str = "(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)";

fn ip_pattern() -> String {
    format!("(?:{OCTET}\\.){{3}}{OCTET}")
}

static IP_EXACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}$", ip_pattern())).unwrap());

/// Unanchored-end IP matcher, used to parse a maximal IP token at a position.
pub(crate) static IP_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}", ip_pattern())).unwrap());

static CIDR_EXACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^{}/(?:3[0-2]|[12][0-9]|[0-9])$", ip_pattern())).unwrap()
});

pub(crate) static RANGE_EXACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^({ip}) ?- ?({ip})$", ip = ip_pattern())).unwrap()
});

static DOMAIN_EXACT: Lazy<Regex> = Lazy::new(|| {
    let label = "(?:[a-z0-9]+|[a-z0-9][a-z0-9_-]+)";
    RegexBuilder::new(&format!("^(?:{label}\\.)+(?:{})\\.?$", tld::alternation()))
        .case_insensitive(true)
        .build()
        .unwrap()
});

/// Detect the signature kind of `text`.
pub fn classify(text: &str) -> SignatureType {
    if RANGE_EXACT.is_match(text) {
        SignatureType::IpRange
    } else if CIDR_EXACT.is_match(text) {
        SignatureType::Cidr
    } else if IP_EXACT.is_match(text) {
        SignatureType::Ip
    } else if DOMAIN_EXACT.is_match(text) {
        SignatureType::Domain
    } else {
        SignatureType::FixedString
    }
}

pub(crate) fn is_exact_ip(text: &str) -> bool {
    IP_EXACT.is_match(text)
}

pub(crate) fn is_exact_domain(text: &str) -> bool {
    DOMAIN_EXACT.is_match(text)
}

/// Numeric value of a dotted-decimal IPv4 token.
///
/// Unlike `Ipv4Addr::from_str` this accepts leading zeros in octets, which
/// the IP token regex also admits.
pub(crate) fn ipv4_value(token: &str) -> Option<u32> {
    let mut value: u32 = 0;
    let mut octets = 0;
    for part in token.split('.') {
        if octets == 4 {
            return None;
        }
        let octet: u8 = part.parse().ok()?;
        value = (value << 8) | u32::from(octet);
        octets += 1;
    }
    (octets == 4).then_some(value)
}
