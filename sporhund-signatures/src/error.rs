//! Error types for signature compilation and set construction.

use thiserror::Error;

use crate::classify::SignatureType;

/// Failures raised while compiling or collecting signatures.
///
/// A `BadSignature` is fatal to the offending signature but never to the
/// scan: callers log it and continue with the rest of the set.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("empty signature text")]
    Empty,

    #[error("invalid {kind} signature `{text}`: {reason}")]
    BadSignature {
        kind: SignatureType,
        text: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SignatureError {
    pub(crate) fn bad(kind: SignatureType, text: &str, reason: impl Into<String>) -> Self {
        Self::BadSignature {
            kind,
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}
