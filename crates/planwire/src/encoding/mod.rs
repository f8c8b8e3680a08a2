//! The binary wire codec for plan trees.
//!
//! # Overview
//!
//! Plans cross process and version boundaries, so the codec is built
//! around two compatibility guarantees:
//!
//! - **Forward compatibility of the operator catalog**: a relation whose
//!   oneof discriminant is unknown to this build decodes to
//!   [`RelationKind::Unrecognized`](crate::plan::RelationKind::Unrecognized)
//!   with its wire id and raw payload, never to a decode error.
//!   Re-encoding reproduces the foreign variant byte-for-byte.
//! - **Unknown-field preservation**: fields added by newer schema
//!   versions inside a known message are kept opaquely in
//!   [`UnknownFields`] and re-emitted on encode.
//!
//! Field numbers are permanent identities. Once assigned they are never
//! reused, even after a field is removed; removed numbers are retired.
//!
//! # Example
//!
//! ```
//! use planwire::encoding::{Decoder, Encoder};
//! use planwire::Relation;
//!
//! let plan = Relation::named_table("users").limit(10);
//! let bytes = plan.encode().unwrap();
//! assert_eq!(Relation::decode(&bytes).unwrap(), plan);
//! ```

mod expr;
mod relation;
mod traits;
mod wire;


pub use traits::{Decoder, Encoder, FORMAT_VERSION};
pub use wire::{RawField, UnknownFields};
