//! Wire codec for the expression collaborator types.
//!
//! Expressions themselves are opaque byte payloads and need no codec of
//! their own; this module handles [`QualifiedAttribute`], the one
//! expression-adjacent type with named fields.

use super::wire::{get_str, put_str, put_unknown, FieldReader, RawField};
use crate::error::{DecodeError, EncodeError};
use crate::expr::QualifiedAttribute;

mod fields {
    pub const NAME: u32 = 1;
    pub const DATA_TYPE: u32 = 2;
}

pub(crate) fn encode_attribute(
    buf: &mut Vec<u8>,
    attr: &QualifiedAttribute,
) -> Result<(), EncodeError> {
    put_str(buf, fields::NAME, &attr.name)?;
    put_str(buf, fields::DATA_TYPE, &attr.data_type)?;
    put_unknown(buf, &attr.unknown_fields)
}

pub(crate) fn decode_attribute(payload: &[u8]) -> Result<QualifiedAttribute, DecodeError> {
    let mut attr = QualifiedAttribute::new("", "");
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::NAME => attr.name = get_str(value).map_err(|e| e.in_field("name"))?,
            fields::DATA_TYPE => {
                attr.data_type = get_str(value).map_err(|e| e.in_field("data_type"))?;
            }
            _ => attr.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(attr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_round_trip() {
        let attr = QualifiedAttribute::new("id", "bigint");

        let mut buf = Vec::new();
        encode_attribute(&mut buf, &attr).unwrap();
        let decoded = decode_attribute(&buf).unwrap();

        assert_eq!(decoded, attr);
    }

    #[test]
    fn unknown_attribute_fields_survive() {
        let attr = QualifiedAttribute::new("id", "bigint");

        let mut buf = Vec::new();
        encode_attribute(&mut buf, &attr).unwrap();
        // Append a field from a newer schema revision.
        crate::encoding::wire::put_field(&mut buf, 50, &[1, 2, 3]).unwrap();

        let decoded = decode_attribute(&buf).unwrap();
        assert_eq!(decoded.unknown_fields.len(), 1);

        let mut reencoded = Vec::new();
        encode_attribute(&mut reencoded, &decoded).unwrap();
        assert_eq!(reencoded, buf);
    }
}
