//! Error taxonomy of the storage core
//!
//! Operations return `anyhow::Result` and raise one of these variants for
//! domain failures. Callers that need to branch on the kind of failure
//! use `err.downcast_ref::<BitError>()`, which sees through any context
//! added on the way up.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BitError {
    /// Malformed binary or textual structure, checksum mismatch, bad varint
    #[error("format error: {0}")]
    Format(String),

    /// Object or reference absent after all fallbacks
    #[error("not found: {0}")]
    NotFound(String),

    /// More than one packed-refs entry matches a name
    #[error("could not resolve ambiguous reference {0}")]
    AmbiguousReference(String),

    /// Rejected input, e.g. a ref-update batch with a non-hex value
    #[error("validation error: {0}")]
    Validation(String),

    /// A stored object is present but cannot be decoded
    #[error("corrupt object {oid}: {reason}")]
    Corrupt { oid: String, reason: String },
}

impl BitError {
    pub fn format(reason: impl Into<String>) -> Self {
        BitError::Format(reason.into())
    }

    /// Kind of the first `BitError` found in the chain of `err`, if any
    pub fn kind_of(err: &anyhow::Error) -> Option<&BitError> {
        err.downcast_ref::<BitError>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn downcast_survives_added_context() {
        let result: anyhow::Result<()> = Err(BitError::NotFound("refs/heads/nope".into()).into());
        let err = result.context("while resolving HEAD").unwrap_err();

        pretty_assertions::assert_eq!(
            BitError::kind_of(&err),
            Some(&BitError::NotFound("refs/heads/nope".into()))
        );
    }
}
