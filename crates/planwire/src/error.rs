//! Error types for the wire codec.
//!
//! Structural validation errors live in [`crate::plan::validate`] and the
//! engine-boundary [`crate::plan::UnsupportedOperation`] in
//! [`crate::plan::visit`], next to the code that produces them.

use thiserror::Error;

/// Errors that can occur while decoding a plan from bytes.
///
/// Decode errors are fatal for the message: the caller must discard it
/// and may request retransmission from the carrying protocol. The codec
/// never attempts partial recovery.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input ended in the middle of a field header or payload.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// The leading format version byte is not one this build understands.
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// A string field holds bytes that are not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A fixed-width scalar field has the wrong payload size.
    #[error("field payload has {actual} bytes, expected {expected}")]
    WrongFieldSize {
        /// The size the scalar requires.
        expected: usize,
        /// The size found on the wire.
        actual: usize,
    },

    /// A required field was absent from the message.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A relation envelope carried no operator variant at all.
    #[error("relation sets no operator variant")]
    MissingVariant,

    /// A relation envelope carried more than one operator variant.
    #[error("relation sets more than one operator variant: {first} and {second}")]
    MultipleVariants {
        /// Field number of the first variant seen.
        first: u32,
        /// Field number of the conflicting variant.
        second: u32,
    },

    /// The plan nests deeper than [`crate::MAX_PLAN_DEPTH`].
    #[error("plan nesting exceeds maximum depth {max}")]
    DepthExceeded {
        /// The configured depth bound.
        max: usize,
    },

    /// Context wrapper naming the field being decoded when the inner
    /// error occurred. Chains through nested messages, so the rendered
    /// message reads like a path: `in join.left: in filter.condition: ...`.
    #[error("in {field}: {source}")]
    Context {
        /// The field being decoded.
        field: &'static str,
        /// The underlying error.
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// Wraps this error with the field it was encountered in.
    #[must_use]
    pub(crate) fn in_field(self, field: &'static str) -> Self {
        Self::Context { field, source: Box::new(self) }
    }
}

/// Errors that can occur while encoding a plan to bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A field payload exceeds the 32-bit length prefix.
    #[error("{what} too long to encode: {len} bytes")]
    TooLong {
        /// What was being encoded.
        what: &'static str,
        /// Its size in bytes.
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_chain_renders_as_path() {
        let err = DecodeError::UnexpectedEof.in_field("filter.condition").in_field("join.left");
        let rendered = err.to_string();
        assert_eq!(rendered, "in join.left: in filter.condition: unexpected end of input");
    }

    #[test]
    fn multiple_variants_display() {
        let err = DecodeError::MultipleVariants { first: 4, second: 8 };
        assert!(err.to_string().contains("4 and 8"));
    }

    #[test]
    fn too_long_display() {
        let err = EncodeError::TooLong { what: "string", len: 5_000_000_000 };
        assert!(err.to_string().contains("string too long"));
    }
}
