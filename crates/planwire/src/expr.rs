//! Expression collaborator types.
//!
//! Expressions belong to an external sub-language with its own variant
//! catalog and codec. This crate only carries them: an [`Expression`] is
//! the sub-language's encoded form, nested on the wire as an opaque
//! message and never interpreted here. [`QualifiedAttribute`] is the
//! schema descriptor that `LocalRelation` uses to declare its columns.

use serde::{Deserialize, Serialize};

use crate::encoding::UnknownFields;

/// An opaque expression node.
///
/// Holds the expression sub-language's own encoded bytes. The plan IR
/// round-trips the payload verbatim; interpreting it is the consumer's
/// job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expression {
    payload: Vec<u8>,
}

impl Expression {
    /// Wraps an already-encoded expression payload.
    #[must_use]
    pub const fn from_encoded(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    /// The encoded payload, exactly as it will appear on the wire.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the expression, returning its encoded payload.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.payload
    }
}

/// A qualified attribute descriptor.
///
/// Declares one column of a `LocalRelation`: a name plus the textual form
/// of its data type. The type text is owned by the expression
/// sub-language and carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifiedAttribute {
    /// The attribute name.
    pub name: String,
    /// The attribute's data type, in the sub-language's textual form.
    pub data_type: String,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl QualifiedAttribute {
    /// Creates a new attribute descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self { name: name.into(), data_type: data_type.into(), unknown_fields: UnknownFields::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_is_opaque() {
        let expr = Expression::from_encoded(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(expr.as_bytes(), &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(expr.clone().into_bytes(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn qualified_attribute() {
        let attr = QualifiedAttribute::new("id", "bigint");
        assert_eq!(attr.name, "id");
        assert_eq!(attr.data_type, "bigint");
        assert!(attr.unknown_fields.is_empty());
    }
}
