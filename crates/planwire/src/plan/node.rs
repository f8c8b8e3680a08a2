//! The plan node.
//!
//! This module defines [`Relation`], the universal plan node, and
//! [`RelationKind`], the closed operator catalog. A plan is a rooted,
//! finite tree: every child is an owned sub-tree and there are no
//! back-references, so cycles are structurally impossible.
//!
//! A relation is constructed once by a producer and read-only afterwards;
//! transformations produce new trees.

#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_lines)]
// const fn with Vec in the signature is not stable
#![allow(clippy::missing_const_for_fn)]

use std::fmt;

use serde::{Deserialize, Serialize};

use super::relational::{
    AggregateNode, DataSource, DeduplicateNode, FilterNode, JoinNode, JoinType, LimitNode,
    LocalRelationNode, OffsetNode, ProjectNode, RangeNode, ReadNode, ReadSource, RepartitionNode,
    SampleNode, SetOpNode, SetOpType, SortField, SortNode, SqlNode, SubqueryAliasNode,
};
use crate::encoding::UnknownFields;
use crate::expr::{Expression, QualifiedAttribute};

/// Permanent wire identities of the operator catalog.
///
/// A number, once assigned, is never reused, even if its operator is
/// later removed; removed numbers are retired. `UNKNOWN` sits at 999,
/// far outside the sequential range, so real operators can keep
/// incrementing without risk of collision.
pub mod variant_ids {
    /// `Read` leaf.
    pub const READ: u32 = 2;
    /// `Project`.
    pub const PROJECT: u32 = 3;
    /// `Filter`.
    pub const FILTER: u32 = 4;
    /// `Join`.
    pub const JOIN: u32 = 5;
    /// `SetOperation`.
    pub const SET_OP: u32 = 6;
    /// `Sort`.
    pub const SORT: u32 = 7;
    /// `Limit`.
    pub const LIMIT: u32 = 8;
    /// `Aggregate`.
    pub const AGGREGATE: u32 = 9;
    /// `SQL` leaf.
    pub const SQL: u32 = 10;
    /// `LocalRelation` leaf.
    pub const LOCAL_RELATION: u32 = 11;
    /// `Sample`.
    pub const SAMPLE: u32 = 12;
    /// `Offset`.
    pub const OFFSET: u32 = 13;
    /// `Deduplicate`.
    pub const DEDUPLICATE: u32 = 14;
    /// `Range` leaf.
    pub const RANGE: u32 = 15;
    /// `SubqueryAlias`.
    pub const SUBQUERY_ALIAS: u32 = 16;
    /// `Repartition`.
    pub const REPARTITION: u32 = 17;
    /// `Unknown` placeholder leaf.
    pub const UNKNOWN: u32 = 999;
}

/// Metadata shared by every relation, free of operator semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationCommon {
    /// Free-form source information for diagnostics.
    pub source_info: String,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl RelationCommon {
    /// Creates common metadata with the given source info.
    #[must_use]
    pub fn new(source_info: impl Into<String>) -> Self {
        Self { source_info: source_info.into(), unknown_fields: UnknownFields::new() }
    }
}

/// An operator variant this build does not know, kept intact.
///
/// Produced when decoding a plan from a newer producer; holds the wire
/// discriminant and the untouched payload so that re-encoding reproduces
/// the foreign variant byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnrecognizedNode {
    /// The oneof discriminant seen on the wire.
    pub variant_id: u32,
    /// The raw variant payload.
    pub payload: Vec<u8>,
}

/// A single node in a plan tree.
///
/// Exactly one operator variant is active per node; the common metadata
/// is optional and diagnostic only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Optional common metadata.
    pub common: Option<RelationCommon>,
    /// The active operator variant.
    pub kind: RelationKind,
}

/// The closed operator catalog.
///
/// Consumers dispatch with a single match over the active variant;
/// adding a catalog member forces every match to be revisited. The one
/// escape path is [`RelationKind::Unrecognized`], which carries variants
/// from producers newer than this build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelationKind {
    // ========== Leaf nodes (no children) ==========
    /// Read from a named table or an external data source.
    Read(ReadNode),

    /// Raw SQL text for the engine to parse.
    Sql(SqlNode),

    /// A local relation declared by its attribute schema.
    LocalRelation(LocalRelationNode),

    /// A generated integer sequence.
    Range(RangeNode),

    // ========== Unary nodes (one child) ==========
    /// Projection over the input.
    Project {
        /// The projection node.
        node: ProjectNode,
        /// The input plan.
        input: Box<Relation>,
    },

    /// Filter rows of the input by a boolean condition.
    Filter {
        /// The filter node.
        node: FilterNode,
        /// The input plan.
        input: Box<Relation>,
    },

    /// Sort the input.
    Sort {
        /// The sort node.
        node: SortNode,
        /// The input plan.
        input: Box<Relation>,
    },

    /// Keep at most `limit` rows of the input.
    Limit {
        /// The limit node.
        node: LimitNode,
        /// The input plan.
        input: Box<Relation>,
    },

    /// Skip the first `offset` rows of the input.
    Offset {
        /// The offset node.
        node: OffsetNode,
        /// The input plan.
        input: Box<Relation>,
    },

    /// Group and aggregate the input.
    Aggregate {
        /// The aggregate node.
        node: AggregateNode,
        /// The input plan.
        input: Box<Relation>,
    },

    /// Sample a fraction of the input rows.
    Sample {
        /// The sample node.
        node: SampleNode,
        /// The input plan.
        input: Box<Relation>,
    },

    /// Drop duplicate rows of the input.
    Deduplicate {
        /// The deduplicate node.
        node: DeduplicateNode,
        /// The input plan.
        input: Box<Relation>,
    },

    /// Give the input an alias.
    SubqueryAlias {
        /// The alias node.
        node: SubqueryAliasNode,
        /// The input plan.
        input: Box<Relation>,
    },

    /// Change the input's partitioning.
    Repartition {
        /// The repartition node.
        node: RepartitionNode,
        /// The input plan.
        input: Box<Relation>,
    },

    // ========== Binary nodes (two children) ==========
    /// Join two relations.
    Join {
        /// The join node (boxed - carries an optional expression).
        node: Box<JoinNode>,
        /// The left input.
        left: Box<Relation>,
        /// The right input.
        right: Box<Relation>,
    },

    /// Set operation over two relations.
    SetOp {
        /// The set operation node.
        node: SetOpNode,
        /// The left input.
        left: Box<Relation>,
        /// The right input.
        right: Box<Relation>,
    },

    // ========== Placeholders ==========
    /// The explicit placeholder variant; carries no fields.
    ///
    /// Structurally valid but never executable; the engine boundary
    /// rejects it as an unsupported operation.
    Unknown,

    /// A variant from a newer producer, preserved by wire id and
    /// payload.
    Unrecognized(UnrecognizedNode),
}

impl Relation {
    // ========== Leaf constructors ==========

    /// Creates a relation with the given variant and no common metadata.
    #[must_use]
    pub fn new(kind: RelationKind) -> Self {
        Self { common: None, kind }
    }

    /// Creates a read of a named catalog table.
    #[must_use]
    pub fn named_table(identifier: impl Into<String>) -> Self {
        Self::new(RelationKind::Read(ReadNode::named_table(identifier)))
    }

    /// Creates a read of an external data source.
    #[must_use]
    pub fn data_source(source: DataSource) -> Self {
        Self::new(RelationKind::Read(ReadNode::data_source(source)))
    }

    /// Creates a raw SQL leaf.
    #[must_use]
    pub fn sql(query: impl Into<String>) -> Self {
        Self::new(RelationKind::Sql(SqlNode::new(query)))
    }

    /// Creates a local relation from its attribute schema.
    #[must_use]
    pub fn local_relation(attributes: Vec<QualifiedAttribute>) -> Self {
        Self::new(RelationKind::LocalRelation(LocalRelationNode::new(attributes)))
    }

    /// Creates a generated integer range.
    #[must_use]
    pub fn range(start: i64, end: i64, step: i64) -> Self {
        Self::new(RelationKind::Range(RangeNode::new(start, end, step)))
    }

    /// Creates the placeholder `Unknown` relation.
    #[must_use]
    pub fn unknown() -> Self {
        Self::new(RelationKind::Unknown)
    }

    // ========== Builder methods ==========

    /// Attaches diagnostic source info to this relation.
    #[must_use]
    pub fn with_source_info(mut self, source_info: impl Into<String>) -> Self {
        self.common = Some(RelationCommon::new(source_info));
        self
    }

    /// Projects the given expressions from this plan.
    #[must_use]
    pub fn project(self, expressions: Vec<Expression>) -> Self {
        Self::new(RelationKind::Project {
            node: ProjectNode::new(expressions),
            input: Box::new(self),
        })
    }

    /// Filters this plan by a boolean condition.
    #[must_use]
    pub fn filter(self, condition: Expression) -> Self {
        Self::new(RelationKind::Filter { node: FilterNode::new(condition), input: Box::new(self) })
    }

    /// Joins this plan with another on a condition.
    #[must_use]
    pub fn join_on(self, right: Relation, join_type: JoinType, condition: Expression) -> Self {
        Self::new(RelationKind::Join {
            node: Box::new(JoinNode::on(join_type, condition)),
            left: Box::new(self),
            right: Box::new(right),
        })
    }

    /// Joins this plan with another using shared column names.
    #[must_use]
    pub fn join_using(self, right: Relation, join_type: JoinType, columns: Vec<String>) -> Self {
        Self::new(RelationKind::Join {
            node: Box::new(JoinNode::using(join_type, columns)),
            left: Box::new(self),
            right: Box::new(right),
        })
    }

    /// Combines this plan with another through a set operation.
    #[must_use]
    pub fn set_op(self, right: Relation, op_type: SetOpType, is_all: bool, by_name: bool) -> Self {
        Self::new(RelationKind::SetOp {
            node: SetOpNode::new(op_type, is_all, by_name),
            left: Box::new(self),
            right: Box::new(right),
        })
    }

    /// Sorts this plan.
    #[must_use]
    pub fn sort(self, fields: Vec<SortField>, is_global: bool) -> Self {
        Self::new(RelationKind::Sort {
            node: SortNode::new(fields, is_global),
            input: Box::new(self),
        })
    }

    /// Limits this plan to at most `limit` rows.
    #[must_use]
    pub fn limit(self, limit: i32) -> Self {
        Self::new(RelationKind::Limit { node: LimitNode::new(limit), input: Box::new(self) })
    }

    /// Skips the first `offset` rows of this plan.
    #[must_use]
    pub fn offset(self, offset: i32) -> Self {
        Self::new(RelationKind::Offset { node: OffsetNode::new(offset), input: Box::new(self) })
    }

    /// Groups and aggregates this plan.
    #[must_use]
    pub fn aggregate(self, grouping: Vec<Expression>, results: Vec<Expression>) -> Self {
        Self::new(RelationKind::Aggregate {
            node: AggregateNode::new(grouping, results),
            input: Box::new(self),
        })
    }

    /// Samples a fraction of this plan's rows.
    #[must_use]
    pub fn sample(self, node: SampleNode) -> Self {
        Self::new(RelationKind::Sample { node, input: Box::new(self) })
    }

    /// Drops duplicate rows of this plan.
    #[must_use]
    pub fn deduplicate(self, node: DeduplicateNode) -> Self {
        Self::new(RelationKind::Deduplicate { node, input: Box::new(self) })
    }

    /// Aliases this plan.
    #[must_use]
    pub fn subquery_alias(self, alias: impl Into<String>) -> Self {
        Self::new(RelationKind::SubqueryAlias {
            node: SubqueryAliasNode::new(alias),
            input: Box::new(self),
        })
    }

    /// Repartitions this plan.
    #[must_use]
    pub fn repartition(self, num_partitions: i32, shuffle: bool) -> Self {
        Self::new(RelationKind::Repartition {
            node: RepartitionNode::new(num_partitions, shuffle),
            input: Box::new(self),
        })
    }

    // ========== Utility methods ==========

    /// Returns the children of this node.
    #[must_use]
    pub fn children(&self) -> Vec<&Relation> {
        match &self.kind {
            // Leaf nodes
            RelationKind::Read(_)
            | RelationKind::Sql(_)
            | RelationKind::LocalRelation(_)
            | RelationKind::Range(_)
            | RelationKind::Unknown
            | RelationKind::Unrecognized(_) => vec![],

            // Unary nodes
            RelationKind::Project { input, .. }
            | RelationKind::Filter { input, .. }
            | RelationKind::Sort { input, .. }
            | RelationKind::Limit { input, .. }
            | RelationKind::Offset { input, .. }
            | RelationKind::Aggregate { input, .. }
            | RelationKind::Sample { input, .. }
            | RelationKind::Deduplicate { input, .. }
            | RelationKind::SubqueryAlias { input, .. }
            | RelationKind::Repartition { input, .. } => vec![input.as_ref()],

            // Binary nodes
            RelationKind::Join { left, right, .. } | RelationKind::SetOp { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
        }
    }

    /// Returns true if this node has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }

    /// Returns the variant name (for display/debugging).
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        match &self.kind {
            RelationKind::Read(_) => "Read",
            RelationKind::Sql(_) => "Sql",
            RelationKind::LocalRelation(_) => "LocalRelation",
            RelationKind::Range(_) => "Range",
            RelationKind::Project { .. } => "Project",
            RelationKind::Filter { .. } => "Filter",
            RelationKind::Sort { .. } => "Sort",
            RelationKind::Limit { .. } => "Limit",
            RelationKind::Offset { .. } => "Offset",
            RelationKind::Aggregate { .. } => "Aggregate",
            RelationKind::Sample { .. } => "Sample",
            RelationKind::Deduplicate { .. } => "Deduplicate",
            RelationKind::SubqueryAlias { .. } => "SubqueryAlias",
            RelationKind::Repartition { .. } => "Repartition",
            RelationKind::Join { .. } => "Join",
            RelationKind::SetOp { .. } => "SetOp",
            RelationKind::Unknown => "Unknown",
            RelationKind::Unrecognized(_) => "Unrecognized",
        }
    }

    /// Returns the permanent wire id of the active variant.
    ///
    /// For [`RelationKind::Unrecognized`] this is the id seen on the
    /// wire, recalled so the engine can report it.
    #[must_use]
    pub fn variant_id(&self) -> u32 {
        match &self.kind {
            RelationKind::Read(_) => variant_ids::READ,
            RelationKind::Project { .. } => variant_ids::PROJECT,
            RelationKind::Filter { .. } => variant_ids::FILTER,
            RelationKind::Join { .. } => variant_ids::JOIN,
            RelationKind::SetOp { .. } => variant_ids::SET_OP,
            RelationKind::Sort { .. } => variant_ids::SORT,
            RelationKind::Limit { .. } => variant_ids::LIMIT,
            RelationKind::Aggregate { .. } => variant_ids::AGGREGATE,
            RelationKind::Sql(_) => variant_ids::SQL,
            RelationKind::LocalRelation(_) => variant_ids::LOCAL_RELATION,
            RelationKind::Sample { .. } => variant_ids::SAMPLE,
            RelationKind::Offset { .. } => variant_ids::OFFSET,
            RelationKind::Deduplicate { .. } => variant_ids::DEDUPLICATE,
            RelationKind::Range(_) => variant_ids::RANGE,
            RelationKind::SubqueryAlias { .. } => variant_ids::SUBQUERY_ALIAS,
            RelationKind::Repartition { .. } => variant_ids::REPARTITION,
            RelationKind::Unknown => variant_ids::UNKNOWN,
            RelationKind::Unrecognized(node) => node.variant_id,
        }
    }

    /// Iterates this tree depth-first, pre-order, without recursion.
    #[must_use]
    pub fn iter(&self) -> PlanIter<'_> {
        PlanIter { stack: vec![self] }
    }

    /// Pretty prints the plan as a tree.
    #[must_use]
    pub fn display_tree(&self) -> DisplayTree<'_> {
        DisplayTree { plan: self }
    }
}

/// Depth-first pre-order iterator over a plan tree.
pub struct PlanIter<'a> {
    stack: Vec<&'a Relation>,
}

impl<'a> Iterator for PlanIter<'a> {
    type Item = &'a Relation;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let children = node.children();
        // Reverse so the left-most child is visited first.
        self.stack.extend(children.into_iter().rev());
        Some(node)
    }
}

/// Helper for tree-style plan display.
pub struct DisplayTree<'a> {
    plan: &'a Relation,
}

impl fmt::Display for DisplayTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.plan, "", true)
    }
}

impl DisplayTree<'_> {
    fn fmt_node(
        &self,
        f: &mut fmt::Formatter<'_>,
        plan: &Relation,
        prefix: &str,
        is_last: bool,
    ) -> fmt::Result {
        let connector = if is_last { "└── " } else { "├── " };

        write!(f, "{prefix}{connector}")?;
        Self::fmt_node_content(f, plan)?;
        writeln!(f)?;

        let children = plan.children();
        let new_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });

        for (i, child) in children.iter().enumerate() {
            self.fmt_node(f, child, &new_prefix, i == children.len() - 1)?;
        }

        Ok(())
    }

    fn fmt_node_content(f: &mut fmt::Formatter<'_>, plan: &Relation) -> fmt::Result {
        match &plan.kind {
            RelationKind::Read(node) => match &node.source {
                ReadSource::NamedTable(table) => {
                    write!(f, "Read: {}", table.unparsed_identifier)?;
                }
                ReadSource::DataSource(source) => {
                    write!(f, "Read: {} source", source.format)?;
                    if !source.options.is_empty() {
                        write!(f, " [{} options]", source.options.len())?;
                    }
                }
            },
            RelationKind::Sql(node) => {
                write!(f, "Sql: {}", node.query)?;
            }
            RelationKind::LocalRelation(node) => {
                write!(f, "LocalRelation: {} attributes", node.attributes.len())?;
            }
            RelationKind::Range(node) => {
                write!(f, "Range: {}..{} step {}", node.start, node.end, node.step)?;
                if let Some(n) = node.num_partitions {
                    write!(f, " [{n} partitions]")?;
                }
            }
            RelationKind::Project { node, .. } => {
                write!(f, "Project: {} expressions", node.expressions.len())?;
            }
            RelationKind::Filter { .. } => {
                write!(f, "Filter")?;
            }
            RelationKind::Sort { node, .. } => {
                write!(f, "Sort: {} fields", node.fields.len())?;
                if node.is_global {
                    write!(f, " [global]")?;
                }
            }
            RelationKind::Limit { node, .. } => {
                write!(f, "Limit: {}", node.limit)?;
            }
            RelationKind::Offset { node, .. } => {
                write!(f, "Offset: {}", node.offset)?;
            }
            RelationKind::Aggregate { node, .. } => {
                write!(
                    f,
                    "Aggregate: {} groups, {} results",
                    node.grouping_expressions.len(),
                    node.result_expressions.len()
                )?;
            }
            RelationKind::Sample { node, .. } => {
                write!(f, "Sample: [{}, {}]", node.lower_bound, node.upper_bound)?;
                if node.with_replacement {
                    write!(f, " with replacement")?;
                }
            }
            RelationKind::Deduplicate { node, .. } => {
                write!(f, "Deduplicate")?;
                if node.all_columns_as_keys {
                    write!(f, ": all columns")?;
                } else if !node.column_names.is_empty() {
                    write!(f, ": {}", node.column_names.join(", "))?;
                }
            }
            RelationKind::SubqueryAlias { node, .. } => {
                write!(f, "SubqueryAlias: {}", node.alias)?;
            }
            RelationKind::Repartition { node, .. } => {
                write!(f, "Repartition: {}", node.num_partitions)?;
                if node.shuffle {
                    write!(f, " [shuffle]")?;
                }
            }
            RelationKind::Join { node, .. } => {
                write!(f, "Join: {}", node.join_type)?;
                if !node.using_columns.is_empty() {
                    write!(f, " USING ({})", node.using_columns.join(", "))?;
                }
            }
            RelationKind::SetOp { node, .. } => {
                write!(f, "SetOp: {}", node.op_type)?;
                if node.is_all {
                    write!(f, " ALL")?;
                }
                if node.by_name {
                    write!(f, " BY NAME")?;
                }
            }
            RelationKind::Unknown => {
                write!(f, "Unknown")?;
            }
            RelationKind::Unrecognized(node) => {
                write!(f, "Unrecognized: variant {}", node.variant_id)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_tree())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_read() {
        let plan = Relation::named_table("users");
        assert_eq!(plan.variant_name(), "Read");
        assert!(plan.is_leaf());
        assert!(plan.children().is_empty());
    }

    #[test]
    fn filter_on_read() {
        let plan = Relation::named_table("users").filter(Expression::from_encoded(vec![1]));

        assert_eq!(plan.variant_name(), "Filter");
        assert!(!plan.is_leaf());
        assert_eq!(plan.children().len(), 1);
    }

    #[test]
    fn join_has_two_children() {
        let plan = Relation::named_table("users").join_using(
            Relation::named_table("orders"),
            JoinType::Inner,
            vec!["user_id".to_owned()],
        );

        assert_eq!(plan.variant_name(), "Join");
        assert_eq!(plan.children().len(), 2);
    }

    #[test]
    fn variant_ids_match_the_catalog() {
        assert_eq!(Relation::named_table("t").variant_id(), variant_ids::READ);
        assert_eq!(Relation::range(0, 1, 1).variant_id(), variant_ids::RANGE);
        assert_eq!(Relation::unknown().variant_id(), variant_ids::UNKNOWN);

        let foreign = Relation::new(RelationKind::Unrecognized(UnrecognizedNode {
            variant_id: 12345,
            payload: vec![],
        }));
        assert_eq!(foreign.variant_id(), 12345);
    }

    #[test]
    fn preorder_iteration() {
        let plan = Relation::named_table("a").join_using(
            Relation::named_table("b").limit(1),
            JoinType::Inner,
            vec!["id".to_owned()],
        );

        let names: Vec<_> = plan.iter().map(Relation::variant_name).collect();
        assert_eq!(names, vec!["Join", "Read", "Limit", "Read"]);
    }

    #[test]
    fn display_tree() {
        let plan = Relation::range(0, 10, 1)
            .filter(Expression::from_encoded(vec![9]))
            .limit(10)
            .with_source_info("test.sql:3");

        let output = format!("{plan}");
        assert!(output.contains("Limit: 10"));
        assert!(output.contains("Filter"));
        assert!(output.contains("Range: 0..10 step 1"));
    }

    #[test]
    fn source_info_is_metadata_only() {
        let bare = Relation::sql("SELECT 1");
        let annotated = Relation::sql("SELECT 1").with_source_info("repl:1");
        assert_ne!(bare, annotated);
        assert_eq!(bare.kind, annotated.kind);
    }
}
