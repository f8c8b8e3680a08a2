//! Encoding and decoding traits for the wire codec.

use crate::error::{DecodeError, EncodeError};

/// A trait for types that can be encoded to bytes.
///
/// Encoding is deterministic for a given value but not canonical across
/// implementations; the only promised law is that decoding an encoded
/// value yields a structurally equal value.
pub trait Encoder: Sized {
    /// Encode this value to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if a payload exceeds the 32-bit length prefix.
    fn encode(&self) -> Result<Vec<u8>, EncodeError>;

    /// Encode this value into a pre-allocated buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError>;
}

/// A trait for types that can be decoded from bytes.
pub trait Decoder: Sized {
    /// Decode a value from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed or truncated. Unknown
    /// operator variants and unknown fields are not errors; see the
    /// module documentation.
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError>;
}

/// Format version for serialized plans.
///
/// The version byte leads every top-level message so that incompatible
/// future revisions of the framing itself can be detected up front.
/// Schema evolution within a version is handled by field numbers, which
/// are permanent: removed numbers are retired, never recycled.
pub const FORMAT_VERSION: u8 = 1;
