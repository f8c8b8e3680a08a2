//! Structural validation of plan trees.
//!
//! A decoded plan is well-formed on the wire but may still be
//! nonsensical: a join carrying both a condition and a USING list, a
//! range that never terminates, a negative limit. [`validate_plan`]
//! walks the tree once and rejects such plans before they reach an
//! engine.
//!
//! Validation is purely structural. It never inspects expression
//! payloads, never resolves names against a catalog, and accepts
//! [`Unknown`](super::RelationKind::Unknown) and
//! [`Unrecognized`](super::RelationKind::Unrecognized) nodes; whether
//! those can be executed is a separate question answered by
//! [`check_supported`](super::check_supported).

use thiserror::Error;

use super::node::{Relation, RelationKind};
use super::relational::ReadSource;
use crate::MAX_PLAN_DEPTH;

/// Errors from structural plan validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructuralError {
    /// A join carries both an expression condition and a USING column
    /// list. The two condition forms are mutually exclusive.
    #[error("join specifies both a condition and using_columns")]
    JoinConditionConflict,

    /// A deduplicate names explicit key columns while also asking for
    /// all columns as keys.
    #[error("deduplicate specifies column_names together with all_columns_as_keys")]
    DeduplicateConflict,

    /// A named table read with an empty identifier.
    #[error("read has an empty table identifier")]
    EmptyTableIdentifier,

    /// A data source read with an empty format.
    #[error("data source has an empty format")]
    EmptyDataSourceFormat,

    /// A projection with no expressions.
    #[error("project has no expressions")]
    EmptyProjection,

    /// A sort with no sort fields.
    #[error("sort has no fields")]
    EmptySort,

    /// A subquery alias with an empty alias name.
    #[error("subquery alias is empty")]
    EmptyAlias,

    /// A negative row limit.
    #[error("limit is negative: {0}")]
    NegativeLimit(i32),

    /// A negative row offset.
    #[error("offset is negative: {0}")]
    NegativeOffset(i32),

    /// A range with a zero step, which would never terminate.
    #[error("range step must not be zero")]
    ZeroRangeStep,

    /// A partition count that is zero or negative.
    #[error("number of partitions must be positive, got {0}")]
    NonPositivePartitions(i32),

    /// The tree is deeper than the supported maximum.
    #[error("plan exceeds maximum depth of {max}")]
    DepthExceeded {
        /// The depth limit in effect.
        max: usize,
    },

    /// An error in a child of the current node, with the path segment
    /// naming which child.
    #[error("in {path}: {source}")]
    Context {
        /// The child slot where the error occurred.
        path: &'static str,
        /// The underlying error.
        source: Box<StructuralError>,
    },
}

impl StructuralError {
    fn at(self, path: &'static str) -> Self {
        StructuralError::Context { path, source: Box::new(self) }
    }
}

/// Validates the structure of a plan tree.
///
/// Walks the whole tree and returns the first violation found, with
/// [`StructuralError::Context`] frames naming the path from the root to
/// the offending node.
///
/// # Errors
///
/// Returns a [`StructuralError`] describing the first structural rule
/// the plan violates.
///
/// # Example
///
/// ```
/// use planwire::{validate_plan, Relation, StructuralError};
///
/// assert_eq!(validate_plan(&Relation::range(0, 10, 1)), Ok(()));
/// assert_eq!(validate_plan(&Relation::range(0, 10, 0)), Err(StructuralError::ZeroRangeStep));
/// ```
pub fn validate_plan(plan: &Relation) -> Result<(), StructuralError> {
    // Bound the depth first so the recursive walk below cannot blow the
    // stack on a pathological tree.
    check_depth(plan)?;
    validate_node(plan)
}

/// Iterative depth check over the whole tree.
fn check_depth(plan: &Relation) -> Result<(), StructuralError> {
    let mut stack = vec![(plan, 1usize)];
    while let Some((node, depth)) = stack.pop() {
        if depth > MAX_PLAN_DEPTH {
            return Err(StructuralError::DepthExceeded { max: MAX_PLAN_DEPTH });
        }
        for child in node.children() {
            stack.push((child, depth + 1));
        }
    }
    Ok(())
}

/// Validates one node, children before the node's own rules.
fn validate_node(plan: &Relation) -> Result<(), StructuralError> {
    match &plan.kind {
        RelationKind::Read(node) => match &node.source {
            ReadSource::NamedTable(table) => {
                if table.unparsed_identifier.is_empty() {
                    return Err(StructuralError::EmptyTableIdentifier);
                }
            }
            ReadSource::DataSource(source) => {
                if source.format.is_empty() {
                    return Err(StructuralError::EmptyDataSourceFormat);
                }
            }
        },
        RelationKind::Project { node, input } => {
            validate_node(input).map_err(|e| e.at("project.input"))?;
            if node.expressions.is_empty() {
                return Err(StructuralError::EmptyProjection);
            }
        }
        RelationKind::Filter { input, .. } => {
            validate_node(input).map_err(|e| e.at("filter.input"))?;
        }
        RelationKind::Join { node, left, right } => {
            validate_node(left).map_err(|e| e.at("join.left"))?;
            validate_node(right).map_err(|e| e.at("join.right"))?;
            if node.condition.is_some() && !node.using_columns.is_empty() {
                return Err(StructuralError::JoinConditionConflict);
            }
        }
        RelationKind::SetOp { left, right, .. } => {
            validate_node(left).map_err(|e| e.at("set_op.left"))?;
            validate_node(right).map_err(|e| e.at("set_op.right"))?;
        }
        RelationKind::Sort { node, input } => {
            validate_node(input).map_err(|e| e.at("sort.input"))?;
            if node.fields.is_empty() {
                return Err(StructuralError::EmptySort);
            }
        }
        RelationKind::Limit { node, input } => {
            validate_node(input).map_err(|e| e.at("limit.input"))?;
            if node.limit < 0 {
                return Err(StructuralError::NegativeLimit(node.limit));
            }
        }
        RelationKind::Offset { node, input } => {
            validate_node(input).map_err(|e| e.at("offset.input"))?;
            if node.offset < 0 {
                return Err(StructuralError::NegativeOffset(node.offset));
            }
        }
        RelationKind::Aggregate { input, .. } => {
            validate_node(input).map_err(|e| e.at("aggregate.input"))?;
        }
        RelationKind::Sample { input, .. } => {
            validate_node(input).map_err(|e| e.at("sample.input"))?;
        }
        RelationKind::Deduplicate { node, input } => {
            validate_node(input).map_err(|e| e.at("deduplicate.input"))?;
            if node.all_columns_as_keys && !node.column_names.is_empty() {
                return Err(StructuralError::DeduplicateConflict);
            }
        }
        RelationKind::Range(node) => {
            if node.step == 0 {
                return Err(StructuralError::ZeroRangeStep);
            }
            if let Some(n) = node.num_partitions {
                if n <= 0 {
                    return Err(StructuralError::NonPositivePartitions(n));
                }
            }
        }
        RelationKind::SubqueryAlias { node, input } => {
            validate_node(input).map_err(|e| e.at("subquery_alias.input"))?;
            if node.alias.is_empty() {
                return Err(StructuralError::EmptyAlias);
            }
        }
        RelationKind::Repartition { node, input } => {
            validate_node(input).map_err(|e| e.at("repartition.input"))?;
            if node.num_partitions <= 0 {
                return Err(StructuralError::NonPositivePartitions(node.num_partitions));
            }
        }
        // Leaves with no structural rules, and the two placeholders.
        // Unknown and Unrecognized are structurally valid; executability
        // is checked separately.
        RelationKind::Sql(_)
        | RelationKind::LocalRelation(_)
        | RelationKind::Unknown
        | RelationKind::Unrecognized(_) => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::expr::Expression;
    use crate::plan::relational::{DeduplicateNode, JoinNode, JoinType};
    use crate::plan::UnrecognizedNode;

    fn expr() -> Expression {
        Expression::from_encoded(vec![0xAB])
    }

    #[test]
    fn valid_pipeline() {
        let plan = Relation::named_table("users").filter(expr()).limit(10);
        assert_eq!(validate_plan(&plan), Ok(()));
    }

    #[test]
    fn join_condition_conflict() {
        let mut node = JoinNode::on(JoinType::Inner, expr());
        node.using_columns.push("id".to_owned());

        let plan = Relation {
            common: None,
            kind: RelationKind::Join {
                node: Box::new(node),
                left: Box::new(Relation::named_table("a")),
                right: Box::new(Relation::named_table("b")),
            },
        };
        assert_eq!(validate_plan(&plan), Err(StructuralError::JoinConditionConflict));
    }

    #[test]
    fn join_with_neither_condition_form_is_valid() {
        // A cross join has no condition at all.
        let plan = Relation {
            common: None,
            kind: RelationKind::Join {
                node: Box::new(JoinNode::new(JoinType::Inner)),
                left: Box::new(Relation::named_table("a")),
                right: Box::new(Relation::named_table("b")),
            },
        };
        assert_eq!(validate_plan(&plan), Ok(()));
    }

    #[test]
    fn deduplicate_conflict() {
        let mut node = DeduplicateNode::all_columns();
        node.column_names.push("id".to_owned());

        let plan = Relation {
            common: None,
            kind: RelationKind::Deduplicate {
                node,
                input: Box::new(Relation::named_table("t")),
            },
        };
        assert_eq!(validate_plan(&plan), Err(StructuralError::DeduplicateConflict));
    }

    #[test]
    fn zero_step_range() {
        assert_eq!(validate_plan(&Relation::range(0, 10, 0)), Err(StructuralError::ZeroRangeStep));
    }

    #[test]
    fn negative_step_range_is_valid() {
        assert_eq!(validate_plan(&Relation::range(10, 0, -1)), Ok(()));
    }

    #[test]
    fn negative_limit() {
        let plan = Relation::named_table("t").limit(-1);
        assert_eq!(validate_plan(&plan), Err(StructuralError::NegativeLimit(-1)));
    }

    #[test]
    fn zero_limit_is_valid() {
        let plan = Relation::named_table("t").limit(0);
        assert_eq!(validate_plan(&plan), Ok(()));
    }

    #[test]
    fn non_positive_partitions() {
        let plan = Relation::named_table("t").repartition(0, true);
        assert_eq!(validate_plan(&plan), Err(StructuralError::NonPositivePartitions(0)));
    }

    #[test]
    fn empty_identifier() {
        assert_eq!(
            validate_plan(&Relation::named_table("")),
            Err(StructuralError::EmptyTableIdentifier)
        );
    }

    #[test]
    fn error_path_names_the_offending_child() {
        let plan = Relation::named_table("a").join_using(
            Relation::range(0, 10, 0),
            JoinType::Inner,
            vec!["id".to_owned()],
        );

        let err = validate_plan(&plan).unwrap_err();
        assert_eq!(err.to_string(), "in join.right: range step must not be zero");
    }

    #[test]
    fn placeholders_are_structurally_valid() {
        assert_eq!(validate_plan(&Relation::unknown()), Ok(()));

        let foreign = Relation {
            common: None,
            kind: RelationKind::Unrecognized(UnrecognizedNode {
                variant_id: 4242,
                payload: vec![1, 2, 3],
            }),
        };
        assert_eq!(validate_plan(&foreign), Ok(()));
    }

    #[test]
    fn depth_limit_enforced() {
        let mut plan = Relation::named_table("t");
        for _ in 0..MAX_PLAN_DEPTH {
            plan = plan.limit(1);
        }
        assert_eq!(
            validate_plan(&plan),
            Err(StructuralError::DepthExceeded { max: MAX_PLAN_DEPTH })
        );
    }

    #[test]
    fn depth_at_limit_is_valid() {
        let mut plan = Relation::named_table("t");
        for _ in 0..MAX_PLAN_DEPTH - 1 {
            plan = plan.limit(1);
        }
        assert_eq!(validate_plan(&plan), Ok(()));
    }
}
