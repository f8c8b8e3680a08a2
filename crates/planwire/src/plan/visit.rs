//! Executability checks at the engine boundary.
//!
//! Placeholder nodes pass structural validation so that plans from
//! newer producers can be stored and relayed, but an engine cannot run
//! them. [`check_supported`] is the gate a consumer calls right before
//! handing a plan to an engine.

use thiserror::Error;

use super::node::{Relation, RelationKind};

/// Errors from the executability check.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnsupportedOperation {
    /// The plan contains an explicit `Unknown` placeholder node.
    #[error("plan contains an unknown relation placeholder")]
    UnknownRelation,

    /// The plan contains a variant from a newer producer that this
    /// build cannot interpret.
    #[error("plan contains unrecognized relation variant {0}")]
    UnrecognizedVariant(u32),
}

/// Checks that every node of the plan can be interpreted by this build.
///
/// # Errors
///
/// Returns [`UnsupportedOperation`] for the first placeholder node
/// found in pre-order.
pub fn check_supported(plan: &Relation) -> Result<(), UnsupportedOperation> {
    for node in plan.iter() {
        match &node.kind {
            RelationKind::Unknown => return Err(UnsupportedOperation::UnknownRelation),
            RelationKind::Unrecognized(n) => {
                return Err(UnsupportedOperation::UnrecognizedVariant(n.variant_id));
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::plan::UnrecognizedNode;

    #[test]
    fn ordinary_plans_are_supported() {
        let plan = Relation::named_table("t").limit(5);
        assert_eq!(check_supported(&plan), Ok(()));
    }

    #[test]
    fn unknown_placeholder_is_rejected() {
        let plan = Relation::unknown().limit(5);
        assert_eq!(check_supported(&plan), Err(UnsupportedOperation::UnknownRelation));
    }

    #[test]
    fn unrecognized_variant_is_rejected_by_id() {
        let foreign = Relation::new(RelationKind::Unrecognized(UnrecognizedNode {
            variant_id: 12345,
            payload: vec![0xFF],
        }));
        let plan = foreign.limit(5);
        assert_eq!(check_supported(&plan), Err(UnsupportedOperation::UnrecognizedVariant(12345)));
    }
}
