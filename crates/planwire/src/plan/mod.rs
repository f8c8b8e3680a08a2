//! The relational plan tree.
//!
//! # Overview
//!
//! A plan is a tree of [`Relation`] nodes, each activating exactly one
//! variant of the closed [`RelationKind`] catalog. The module splits
//! into:
//!
//! - [`node`] - the universal node, the catalog, builders, iteration
//!   and display
//! - [`relational`] - the per-variant field structs and wire enums
//! - [`validate`] - structural validation via [`validate_plan`]
//! - [`visit`] - the executability gate via [`check_supported`]

pub mod node;
pub mod relational;
pub mod validate;
pub mod visit;

pub use node::{
    variant_ids, DisplayTree, PlanIter, Relation, RelationCommon, RelationKind, UnrecognizedNode,
};
pub use relational::{
    AggregateNode, DataSource, DeduplicateNode, FilterNode, JoinNode, JoinType, LimitNode,
    LocalRelationNode, NamedTable, NullOrdering, OffsetNode, ProjectNode, RangeNode, ReadNode,
    ReadSource, RepartitionNode, SampleNode, SetOpNode, SetOpType, SortDirection, SortField,
    SortNode, SqlNode, SubqueryAliasNode,
};
pub use validate::{validate_plan, StructuralError};
pub use visit::{check_supported, UnsupportedOperation};
