//! End-to-end tests for `planwire`.
//!
//! These tests exercise the full producer/consumer path:
//! - Build a plan, validate it, encode it, decode it, validate again
//! - Forward compatibility with newer producers
//! - The executability gate at the engine boundary

use planwire::encoding::{Decoder, Encoder, UnknownFields, FORMAT_VERSION};
use planwire::{
    check_supported, validate_plan, DataSource, Expression, JoinType, OptionMap,
    QualifiedAttribute, Relation, RelationKind, SampleNode, SetOpType, SortField, StructuralError,
    UnrecognizedNode, UnsupportedOperation, MAX_PLAN_DEPTH,
};

fn expr(bytes: &[u8]) -> Expression {
    Expression::from_encoded(bytes.to_vec())
}

// ============================================================================
// Producer to Consumer
// ============================================================================

mod pipeline {
    use super::*;

    #[test]
    fn range_limit_round_trip() {
        let plan = Relation::range(0, 10, 1).limit(5);

        validate_plan(&plan).unwrap();
        check_supported(&plan).unwrap();

        let bytes = plan.encode().unwrap();
        let decoded = Relation::decode(&bytes).unwrap();

        assert_eq!(decoded, plan);
        validate_plan(&decoded).unwrap();
    }

    #[test]
    fn full_catalog_round_trip() {
        let prices = Relation::data_source(
            DataSource::new("parquet")
                .with_schema("sku STRING, price DOUBLE")
                .with_option("path", "/data/prices"),
        );

        let plan = Relation::named_table("orders")
            .filter(expr(b"\x01status='open'"))
            .join_using(prices, JoinType::LeftOuter, vec!["sku".to_owned()])
            .aggregate(vec![expr(b"\x02sku")], vec![expr(b"\x03sum(price)")])
            .sort(vec![SortField::desc(expr(b"\x03sum(price)"))], true)
            .limit(100)
            .offset(10)
            .subquery_alias("top_orders")
            .repartition(8, true)
            .with_source_info("report.sql:12");

        validate_plan(&plan).unwrap();
        let decoded = Relation::decode(&plan.encode().unwrap()).unwrap();
        assert_eq!(decoded, plan);
    }

    #[test]
    fn set_operations_and_sampling_round_trip() {
        let plan = Relation::sql("SELECT id FROM a")
            .set_op(Relation::sql("SELECT id FROM b"), SetOpType::Union, true, false)
            .sample(SampleNode::new(0.0, 0.25, false).with_seed(42))
            .deduplicate(planwire::DeduplicateNode::all_columns());

        validate_plan(&plan).unwrap();
        let decoded = Relation::decode(&plan.encode().unwrap()).unwrap();
        assert_eq!(decoded, plan);
    }

    #[test]
    fn local_relation_round_trip() {
        let plan = Relation::local_relation(vec![
            QualifiedAttribute::new("id", "bigint"),
            QualifiedAttribute::new("name", "string"),
        ]);

        validate_plan(&plan).unwrap();
        let decoded = Relation::decode(&plan.encode().unwrap()).unwrap();
        assert_eq!(decoded, plan);
    }

    #[test]
    fn display_survives_the_wire() {
        let plan = Relation::named_table("users").filter(expr(b"\x01")).limit(3);
        let decoded = Relation::decode(&plan.encode().unwrap()).unwrap();
        assert_eq!(format!("{plan}"), format!("{decoded}"));
    }
}

// ============================================================================
// Validation
// ============================================================================

mod validation {
    use super::*;

    #[test]
    fn join_with_both_condition_forms_is_rejected() {
        // Decode a join that a buggy producer gave both an ON condition
        // and a USING list. The codec accepts it; validation does not.
        let mut plan = Relation::named_table("a").join_on(
            Relation::named_table("b"),
            JoinType::Inner,
            expr(b"\x03eq"),
        );
        if let RelationKind::Join { node, .. } = &mut plan.kind {
            node.using_columns.push("id".to_owned());
        }

        let decoded = Relation::decode(&plan.encode().unwrap()).unwrap();
        assert_eq!(validate_plan(&decoded), Err(StructuralError::JoinConditionConflict));
    }

    #[test]
    fn wire_level_defaults_can_fail_validation() {
        // A range missing its step decodes to step 0, which the
        // validator then rejects.
        let plan = Relation::range(0, 10, 0);
        let decoded = Relation::decode(&plan.encode().unwrap()).unwrap();
        assert_eq!(validate_plan(&decoded), Err(StructuralError::ZeroRangeStep));
    }

    #[test]
    fn deep_plans_are_rejected_by_both_layers() {
        let mut plan = Relation::named_table("t");
        for _ in 0..MAX_PLAN_DEPTH {
            plan = plan.limit(1);
        }

        assert_eq!(
            validate_plan(&plan),
            Err(StructuralError::DepthExceeded { max: MAX_PLAN_DEPTH })
        );
        assert!(Relation::decode(&plan.encode().unwrap()).is_err());
    }
}

// ============================================================================
// Forward Compatibility
// ============================================================================

mod forward_compat {
    use super::*;

    #[test]
    fn foreign_variant_survives_a_relay() {
        // A newer producer sends variant 12345. This build cannot
        // interpret it but must carry it through unchanged.
        let foreign = Relation::new(RelationKind::Unrecognized(UnrecognizedNode {
            variant_id: 12345,
            payload: vec![0xAA, 0xBB, 0xCC],
        }));

        let bytes = foreign.encode().unwrap();
        let decoded = Relation::decode(&bytes).unwrap();

        match &decoded.kind {
            RelationKind::Unrecognized(node) => assert_eq!(node.variant_id, 12345),
            other => panic!("expected Unrecognized, got {other:?}"),
        }

        // Validation passes; execution is refused with the wire id.
        validate_plan(&decoded).unwrap();
        assert_eq!(check_supported(&decoded), Err(UnsupportedOperation::UnrecognizedVariant(12345)));

        // The relay re-encodes byte-for-byte.
        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn unknown_placeholder_is_storable_but_not_executable() {
        let plan = Relation::unknown().limit(1);

        validate_plan(&plan).unwrap();
        assert_eq!(check_supported(&plan), Err(UnsupportedOperation::UnknownRelation));

        let decoded = Relation::decode(&plan.encode().unwrap()).unwrap();
        assert_eq!(decoded, plan);
    }

    #[test]
    fn unknown_fields_round_trip_through_a_node() {
        let mut plan = Relation::sql("SELECT 1");
        if let RelationKind::Sql(node) = &mut plan.kind {
            let mut unknown = UnknownFields::new();
            unknown.push(planwire::encoding::RawField { field_no: 40, payload: vec![1, 2] });
            node.unknown_fields = unknown;
        }

        let bytes = plan.encode().unwrap();
        let decoded = Relation::decode(&bytes).unwrap();
        assert_eq!(decoded, plan);
        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn version_mismatch_is_refused_up_front() {
        let mut bytes = Relation::sql("SELECT 1").encode().unwrap();
        assert_eq!(bytes[0], FORMAT_VERSION);
        bytes[0] = FORMAT_VERSION + 1;
        assert!(Relation::decode(&bytes).is_err());
    }
}

// ============================================================================
// Diagnostic Serialization
// ============================================================================

mod serde_dumps {
    use super::*;

    #[test]
    fn plans_serialize_to_json_for_diagnostics() {
        // The serde derives are for host-side dumps; the wire contract
        // stays the binary codec.
        let plan = Relation::range(0, 10, 1).limit(5).with_source_info("repl:1");

        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("repl:1"));

        let back: Relation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}

// ============================================================================
// Option Map Semantics
// ============================================================================

mod options {
    use super::*;

    #[test]
    fn casing_is_preserved_on_the_wire_but_ignored_for_lookup() {
        let source = DataSource::new("csv").with_option("Header", "true");
        let plan = Relation::data_source(source);

        let decoded = Relation::decode(&plan.encode().unwrap()).unwrap();
        let RelationKind::Read(node) = &decoded.kind else {
            panic!("expected read");
        };
        let planwire::ReadSource::DataSource(source) = &node.source else {
            panic!("expected data source read");
        };

        assert_eq!(source.options.get("header"), Some("true"));
        assert_eq!(source.options.get("HEADER"), Some("true"));
        let keys: Vec<_> = source.options.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Header"]);
    }

    #[test]
    fn replacement_keeps_first_seen_casing() {
        let mut map = OptionMap::new();
        map.insert("Path", "/a");
        map.insert("path", "/b");

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("PATH"), Some("/b"));
        let keys: Vec<_> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Path"]);
    }
}
