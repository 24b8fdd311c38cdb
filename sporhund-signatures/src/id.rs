//! SHA-224 content digests used as stable identities.
//!
//! Signatures are identified by the digest of their canonical text, alarms
//! by the digest of the matched line. The digest is what persisted documents
//! carry as `id`, rendered as lowercase hex.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha224};
use thiserror::Error;

/// Length of a SHA-224 digest in bytes.
pub const DIGEST_LEN: usize = 28;

/// A 28-byte SHA-224 digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Digest of a canonical text.
    pub fn of(text: &str) -> Self {
        Self(Sha224::digest(text.as_bytes()).into())
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

#[derive(Debug, Error)]
#[error("invalid digest `{0}`: expected {DIGEST_LEN} hex-encoded bytes")]
pub struct DigestParseError(String);

impl FromStr for Digest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| DigestParseError(s.to_string()))?;
        let bytes: [u8; DIGEST_LEN] = bytes
            .try_into()
            .map_err(|_| DigestParseError(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable() {
        assert_eq!(Digest::of("evil.com"), Digest::of("evil.com"));
        assert_ne!(Digest::of("evil.com"), Digest::of("evil.org"));
    }

    #[test]
    fn hex_round_trip() {
        let id = Digest::of("192.168.1.1");
        let parsed: Digest = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.to_string().len(), DIGEST_LEN * 2);
    }

    #[test]
    fn rejects_short_hex() {
        assert!("deadbeef".parse::<Digest>().is_err());
        assert!("not hex at all".parse::<Digest>().is_err());
    }

    #[test]
    fn serde_as_hex_string() {
        let id = Digest::of("evil.com");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
