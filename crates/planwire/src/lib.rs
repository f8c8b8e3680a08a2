//! Planwire
//!
//! An intermediate representation for relational query plans, exchanged
//! between a client that expresses data-transformation intent and an
//! execution engine that evaluates it.
//!
//! # Overview
//!
//! The crate has three responsibilities that share one node model:
//!
//! - **Node model**: [`Relation`] is the universal plan node, a tree with
//!   exactly one active operator variant per node ([`RelationKind`]).
//! - **Validator**: [`validate_plan`] checks structural soundness before
//!   any interpretation (mutually exclusive fields, positive counts,
//!   bounded nesting).
//! - **Wire codec**: [`Encoder`]/[`Decoder`] give a deterministic,
//!   versioned binary encoding with forward-compatibility guarantees:
//!   unknown operator variants decode to [`RelationKind::Unrecognized`]
//!   and unknown fields are preserved opaquely for re-serialization.
//!
//! Expressions are owned by an external expression sub-language; this
//! crate carries them as opaque [`Expression`] payloads and never
//! interprets them.
//!
//! # Example
//!
//! ```
//! use planwire::encoding::{Decoder, Encoder};
//! use planwire::{validate_plan, Relation};
//!
//! // Read a table, keep the first five rows of a generated range.
//! let plan = Relation::range(0, 10, 1).limit(5);
//!
//! validate_plan(&plan).unwrap();
//!
//! let bytes = plan.encode().unwrap();
//! let decoded = Relation::decode(&bytes).unwrap();
//! assert_eq!(decoded, plan);
//! ```
//!
//! # Modules
//!
//! - [`plan`] - The node model, validator, and traversal helpers
//! - [`encoding`] - The binary wire codec
//! - [`expr`] - Opaque expression collaborator types
//! - [`options`] - Case-insensitive option map for data-source reads
//! - [`error`] - Codec error types

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod encoding;
pub mod error;
pub mod expr;
pub mod options;
pub mod plan;

pub use error::{DecodeError, EncodeError};
pub use expr::{Expression, QualifiedAttribute};
pub use options::OptionMap;
pub use plan::{
    check_supported, validate_plan, AggregateNode, DataSource, DeduplicateNode, FilterNode,
    JoinNode, JoinType, LimitNode, LocalRelationNode, NamedTable, NullOrdering, OffsetNode,
    ProjectNode, RangeNode, ReadNode, ReadSource, Relation, RelationCommon, RelationKind,
    RepartitionNode, SampleNode, SetOpNode, SetOpType, SortDirection, SortField, SortNode, SqlNode,
    StructuralError, SubqueryAliasNode, UnrecognizedNode, UnsupportedOperation,
};

/// Maximum nesting depth accepted by the validator and the decoder.
///
/// Plans deeper than this are rejected with a bounded-recursion error
/// instead of risking stack exhaustion on adversarial input. The bound
/// is sized so that the codec's one-frame-per-level recursion stays
/// well inside a 2 MiB thread stack; realistic plans are far shallower.
pub const MAX_PLAN_DEPTH: usize = 128;
