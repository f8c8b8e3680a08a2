//! Wire codec for [`Relation`] trees.
//!
//! A top-level message is a single [`FORMAT_VERSION`] byte followed by
//! the relation envelope. The envelope holds the optional common
//! metadata at field 1 and exactly one operator variant at the variant's
//! permanent field number; nested child relations are plain envelopes
//! without the version byte.
//!
//! Two guarantees shape the decoder:
//!
//! - an envelope variant number this build does not know decodes to
//!   [`RelationKind::Unrecognized`], payload kept verbatim, and encodes
//!   back byte-identically;
//! - field numbers inside a known message that this build does not know
//!   are preserved in each node's `unknown_fields` and re-emitted after
//!   the known fields.

use super::expr::{decode_attribute, encode_attribute};
use super::traits::{Decoder, Encoder, FORMAT_VERSION};
use super::wire::{
    get_bool, get_f64, get_i32, get_i64, get_str, put_bool, put_f64, put_field, put_i32, put_i64,
    put_message, put_str, put_unknown, FieldReader, RawField, UnknownFields,
};
use crate::error::{DecodeError, EncodeError};
use crate::expr::Expression;
use crate::plan::relational::{
    AggregateNode, DataSource, DeduplicateNode, FilterNode, JoinNode, JoinType, LimitNode,
    LocalRelationNode, NamedTable, NullOrdering, OffsetNode, ProjectNode, RangeNode, ReadNode,
    ReadSource, RepartitionNode, SampleNode, SetOpNode, SetOpType, SortDirection, SortField,
    SortNode, SqlNode, SubqueryAliasNode,
};
use crate::plan::{variant_ids, Relation, RelationCommon, RelationKind, UnrecognizedNode};
use crate::MAX_PLAN_DEPTH;

/// Field numbers inside each message type.
///
/// Like the variant ids, these are permanent: a number is never reused
/// for a different meaning, even after the field it named is removed.
mod fields {
    pub mod relation {
        pub const COMMON: u32 = 1;
    }
    pub mod common {
        pub const SOURCE_INFO: u32 = 1;
    }
    pub mod read {
        pub const NAMED_TABLE: u32 = 1;
        pub const DATA_SOURCE: u32 = 2;
    }
    pub mod named_table {
        pub const UNPARSED_IDENTIFIER: u32 = 1;
    }
    pub mod data_source {
        pub const FORMAT: u32 = 1;
        pub const SCHEMA: u32 = 2;
        pub const OPTIONS: u32 = 3;
    }
    pub mod option_entry {
        pub const KEY: u32 = 1;
        pub const VALUE: u32 = 2;
    }
    pub mod project {
        pub const INPUT: u32 = 1;
        // 2 is retired (was the pre-release expression list).
        pub const EXPRESSIONS: u32 = 3;
    }
    pub mod filter {
        pub const INPUT: u32 = 1;
        pub const CONDITION: u32 = 2;
    }
    pub mod join {
        pub const LEFT: u32 = 1;
        pub const RIGHT: u32 = 2;
        pub const CONDITION: u32 = 3;
        pub const JOIN_TYPE: u32 = 4;
        pub const USING_COLUMNS: u32 = 5;
    }
    pub mod set_op {
        pub const LEFT: u32 = 1;
        pub const RIGHT: u32 = 2;
        pub const OP_TYPE: u32 = 3;
        pub const IS_ALL: u32 = 4;
        pub const BY_NAME: u32 = 5;
    }
    pub mod sort {
        pub const INPUT: u32 = 1;
        pub const FIELDS: u32 = 2;
        pub const IS_GLOBAL: u32 = 3;
    }
    pub mod sort_field {
        pub const EXPRESSION: u32 = 1;
        pub const DIRECTION: u32 = 2;
        pub const NULL_ORDERING: u32 = 3;
    }
    pub mod limit {
        pub const INPUT: u32 = 1;
        pub const LIMIT: u32 = 2;
    }
    pub mod offset {
        pub const INPUT: u32 = 1;
        pub const OFFSET: u32 = 2;
    }
    pub mod aggregate {
        pub const INPUT: u32 = 1;
        pub const GROUPING_EXPRESSIONS: u32 = 2;
        pub const RESULT_EXPRESSIONS: u32 = 3;
    }
    pub mod sql {
        pub const QUERY: u32 = 1;
    }
    pub mod local_relation {
        pub const ATTRIBUTES: u32 = 1;
    }
    pub mod sample {
        pub const INPUT: u32 = 1;
        pub const LOWER_BOUND: u32 = 2;
        pub const UPPER_BOUND: u32 = 3;
        pub const WITH_REPLACEMENT: u32 = 4;
        pub const SEED: u32 = 5;
    }
    pub mod deduplicate {
        pub const INPUT: u32 = 1;
        pub const COLUMN_NAMES: u32 = 2;
        pub const ALL_COLUMNS_AS_KEYS: u32 = 3;
    }
    pub mod range {
        pub const START: u32 = 1;
        pub const END: u32 = 2;
        pub const STEP: u32 = 3;
        pub const NUM_PARTITIONS: u32 = 4;
    }
    pub mod subquery_alias {
        pub const INPUT: u32 = 1;
        pub const ALIAS: u32 = 2;
        pub const QUALIFIER: u32 = 3;
    }
    pub mod repartition {
        pub const INPUT: u32 = 1;
        pub const NUM_PARTITIONS: u32 = 2;
        pub const SHUFFLE: u32 = 3;
    }
}

impl Encoder for Relation {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        self.encode_to(&mut buf)?;
        Ok(buf)
    }

    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        buf.push(FORMAT_VERSION);
        encode_envelope(buf, self)
    }
}

impl Decoder for Relation {
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (&version, body) = bytes.split_first().ok_or(DecodeError::UnexpectedEof)?;
        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        decode_envelope(body, 1)
    }
}

// ============================================================
// Encoding
// ============================================================

/// Encodes the relation envelope, without the version byte.
fn encode_envelope(buf: &mut Vec<u8>, rel: &Relation) -> Result<(), EncodeError> {
    if let Some(common) = &rel.common {
        put_message(buf, fields::relation::COMMON, |b| {
            put_str(b, fields::common::SOURCE_INFO, &common.source_info)?;
            put_unknown(b, &common.unknown_fields)
        })?;
    }

    // Unrecognized variants are re-emitted verbatim at their original
    // wire id; everything else goes through its variant encoder.
    if let RelationKind::Unrecognized(node) = &rel.kind {
        return put_field(buf, node.variant_id, &node.payload);
    }

    put_message(buf, rel.variant_id(), |b| encode_variant(b, &rel.kind))
}

fn encode_variant(buf: &mut Vec<u8>, kind: &RelationKind) -> Result<(), EncodeError> {
    match kind {
        RelationKind::Read(node) => encode_read(buf, node),
        RelationKind::Project { node, input } => {
            put_message(buf, fields::project::INPUT, |b| encode_envelope(b, input))?;
            for expr in &node.expressions {
                put_field(buf, fields::project::EXPRESSIONS, expr.as_bytes())?;
            }
            put_unknown(buf, &node.unknown_fields)
        }
        RelationKind::Filter { node, input } => {
            put_message(buf, fields::filter::INPUT, |b| encode_envelope(b, input))?;
            put_field(buf, fields::filter::CONDITION, node.condition.as_bytes())?;
            put_unknown(buf, &node.unknown_fields)
        }
        RelationKind::Join { node, left, right } => {
            put_message(buf, fields::join::LEFT, |b| encode_envelope(b, left))?;
            put_message(buf, fields::join::RIGHT, |b| encode_envelope(b, right))?;
            if let Some(condition) = &node.condition {
                put_field(buf, fields::join::CONDITION, condition.as_bytes())?;
            }
            put_i32(buf, fields::join::JOIN_TYPE, node.join_type.as_i32())?;
            for column in &node.using_columns {
                put_str(buf, fields::join::USING_COLUMNS, column)?;
            }
            put_unknown(buf, &node.unknown_fields)
        }
        RelationKind::SetOp { node, left, right } => {
            put_message(buf, fields::set_op::LEFT, |b| encode_envelope(b, left))?;
            put_message(buf, fields::set_op::RIGHT, |b| encode_envelope(b, right))?;
            put_i32(buf, fields::set_op::OP_TYPE, node.op_type.as_i32())?;
            put_bool(buf, fields::set_op::IS_ALL, node.is_all)?;
            put_bool(buf, fields::set_op::BY_NAME, node.by_name)?;
            put_unknown(buf, &node.unknown_fields)
        }
        RelationKind::Sort { node, input } => {
            put_message(buf, fields::sort::INPUT, |b| encode_envelope(b, input))?;
            for field in &node.fields {
                put_message(buf, fields::sort::FIELDS, |b| encode_sort_field(b, field))?;
            }
            put_bool(buf, fields::sort::IS_GLOBAL, node.is_global)?;
            put_unknown(buf, &node.unknown_fields)
        }
        RelationKind::Limit { node, input } => {
            put_message(buf, fields::limit::INPUT, |b| encode_envelope(b, input))?;
            put_i32(buf, fields::limit::LIMIT, node.limit)?;
            put_unknown(buf, &node.unknown_fields)
        }
        RelationKind::Offset { node, input } => {
            put_message(buf, fields::offset::INPUT, |b| encode_envelope(b, input))?;
            put_i32(buf, fields::offset::OFFSET, node.offset)?;
            put_unknown(buf, &node.unknown_fields)
        }
        RelationKind::Aggregate { node, input } => {
            put_message(buf, fields::aggregate::INPUT, |b| encode_envelope(b, input))?;
            for expr in &node.grouping_expressions {
                put_field(buf, fields::aggregate::GROUPING_EXPRESSIONS, expr.as_bytes())?;
            }
            for expr in &node.result_expressions {
                put_field(buf, fields::aggregate::RESULT_EXPRESSIONS, expr.as_bytes())?;
            }
            put_unknown(buf, &node.unknown_fields)
        }
        RelationKind::Sql(node) => {
            put_str(buf, fields::sql::QUERY, &node.query)?;
            put_unknown(buf, &node.unknown_fields)
        }
        RelationKind::LocalRelation(node) => {
            for attr in &node.attributes {
                put_message(buf, fields::local_relation::ATTRIBUTES, |b| {
                    encode_attribute(b, attr)
                })?;
            }
            put_unknown(buf, &node.unknown_fields)
        }
        RelationKind::Sample { node, input } => {
            put_message(buf, fields::sample::INPUT, |b| encode_envelope(b, input))?;
            put_f64(buf, fields::sample::LOWER_BOUND, node.lower_bound)?;
            put_f64(buf, fields::sample::UPPER_BOUND, node.upper_bound)?;
            put_bool(buf, fields::sample::WITH_REPLACEMENT, node.with_replacement)?;
            if let Some(seed) = node.seed {
                put_i64(buf, fields::sample::SEED, seed)?;
            }
            put_unknown(buf, &node.unknown_fields)
        }
        RelationKind::Deduplicate { node, input } => {
            put_message(buf, fields::deduplicate::INPUT, |b| encode_envelope(b, input))?;
            for column in &node.column_names {
                put_str(buf, fields::deduplicate::COLUMN_NAMES, column)?;
            }
            put_bool(buf, fields::deduplicate::ALL_COLUMNS_AS_KEYS, node.all_columns_as_keys)?;
            put_unknown(buf, &node.unknown_fields)
        }
        RelationKind::Range(node) => {
            put_i64(buf, fields::range::START, node.start)?;
            put_i64(buf, fields::range::END, node.end)?;
            put_i64(buf, fields::range::STEP, node.step)?;
            if let Some(n) = node.num_partitions {
                put_i32(buf, fields::range::NUM_PARTITIONS, n)?;
            }
            put_unknown(buf, &node.unknown_fields)
        }
        RelationKind::SubqueryAlias { node, input } => {
            put_message(buf, fields::subquery_alias::INPUT, |b| encode_envelope(b, input))?;
            put_str(buf, fields::subquery_alias::ALIAS, &node.alias)?;
            for part in &node.qualifier {
                put_str(buf, fields::subquery_alias::QUALIFIER, part)?;
            }
            put_unknown(buf, &node.unknown_fields)
        }
        RelationKind::Repartition { node, input } => {
            put_message(buf, fields::repartition::INPUT, |b| encode_envelope(b, input))?;
            put_i32(buf, fields::repartition::NUM_PARTITIONS, node.num_partitions)?;
            put_bool(buf, fields::repartition::SHUFFLE, node.shuffle)?;
            put_unknown(buf, &node.unknown_fields)
        }
        // Deliberately empty payload.
        RelationKind::Unknown => Ok(()),
        // Handled in encode_envelope before dispatch.
        RelationKind::Unrecognized(_) => unreachable!("unrecognized encoded verbatim"),
    }
}

fn encode_read(buf: &mut Vec<u8>, node: &ReadNode) -> Result<(), EncodeError> {
    match &node.source {
        ReadSource::NamedTable(table) => put_message(buf, fields::read::NAMED_TABLE, |b| {
            put_str(b, fields::named_table::UNPARSED_IDENTIFIER, &table.unparsed_identifier)?;
            put_unknown(b, &table.unknown_fields)
        })?,
        ReadSource::DataSource(source) => put_message(buf, fields::read::DATA_SOURCE, |b| {
            put_str(b, fields::data_source::FORMAT, &source.format)?;
            if let Some(schema) = &source.schema {
                put_str(b, fields::data_source::SCHEMA, schema)?;
            }
            for (key, value) in source.options.iter() {
                put_message(b, fields::data_source::OPTIONS, |entry| {
                    put_str(entry, fields::option_entry::KEY, key)?;
                    put_str(entry, fields::option_entry::VALUE, value)
                })?;
            }
            put_unknown(b, &source.unknown_fields)
        })?,
    }
    put_unknown(buf, &node.unknown_fields)
}

fn encode_sort_field(buf: &mut Vec<u8>, field: &SortField) -> Result<(), EncodeError> {
    put_field(buf, fields::sort_field::EXPRESSION, field.expression.as_bytes())?;
    put_i32(buf, fields::sort_field::DIRECTION, field.direction.as_i32())?;
    put_i32(buf, fields::sort_field::NULL_ORDERING, field.nulls.as_i32())?;
    put_unknown(buf, &field.unknown_fields)
}

// ============================================================
// Decoding
// ============================================================

/// Decodes a relation envelope at the given nesting depth.
fn decode_envelope(payload: &[u8], depth: usize) -> Result<Relation, DecodeError> {
    if depth > MAX_PLAN_DEPTH {
        return Err(DecodeError::DepthExceeded { max: MAX_PLAN_DEPTH });
    }

    let mut common = None;
    let mut variant: Option<(u32, &[u8])> = None;

    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        if field_no == fields::relation::COMMON {
            common = Some(decode_common(value).map_err(|e| e.in_field("common"))?);
        } else if let Some((first, _)) = variant {
            return Err(DecodeError::MultipleVariants { first, second: field_no });
        } else {
            variant = Some((field_no, value));
        }
    }

    let (variant_id, payload) = variant.ok_or(DecodeError::MissingVariant)?;
    let kind = decode_variant(variant_id, payload, depth)?;
    Ok(Relation { common, kind })
}

fn decode_common(payload: &[u8]) -> Result<RelationCommon, DecodeError> {
    let mut common = RelationCommon::new("");
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::common::SOURCE_INFO => {
                common.source_info = get_str(value).map_err(|e| e.in_field("source_info"))?;
            }
            _ => common.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(common)
}

fn decode_variant(variant_id: u32, payload: &[u8], depth: usize) -> Result<RelationKind, DecodeError> {
    match variant_id {
        variant_ids::READ => {
            Ok(RelationKind::Read(decode_read(payload).map_err(|e| e.in_field("read"))?))
        }
        variant_ids::PROJECT => decode_project(payload, depth).map_err(|e| e.in_field("project")),
        variant_ids::FILTER => decode_filter(payload, depth).map_err(|e| e.in_field("filter")),
        variant_ids::JOIN => decode_join(payload, depth).map_err(|e| e.in_field("join")),
        variant_ids::SET_OP => decode_set_op(payload, depth).map_err(|e| e.in_field("set_op")),
        variant_ids::SORT => decode_sort(payload, depth).map_err(|e| e.in_field("sort")),
        variant_ids::LIMIT => decode_limit(payload, depth).map_err(|e| e.in_field("limit")),
        variant_ids::AGGREGATE => {
            decode_aggregate(payload, depth).map_err(|e| e.in_field("aggregate"))
        }
        variant_ids::SQL => decode_sql(payload).map_err(|e| e.in_field("sql")),
        variant_ids::LOCAL_RELATION => {
            decode_local_relation(payload).map_err(|e| e.in_field("local_relation"))
        }
        variant_ids::SAMPLE => decode_sample(payload, depth).map_err(|e| e.in_field("sample")),
        variant_ids::OFFSET => decode_offset(payload, depth).map_err(|e| e.in_field("offset")),
        variant_ids::DEDUPLICATE => {
            decode_deduplicate(payload, depth).map_err(|e| e.in_field("deduplicate"))
        }
        variant_ids::RANGE => decode_range(payload).map_err(|e| e.in_field("range")),
        variant_ids::SUBQUERY_ALIAS => {
            decode_subquery_alias(payload, depth).map_err(|e| e.in_field("subquery_alias"))
        }
        variant_ids::REPARTITION => {
            decode_repartition(payload, depth).map_err(|e| e.in_field("repartition"))
        }
        variant_ids::UNKNOWN => {
            // The placeholder carries no semantics; tolerate any fields a
            // newer producer may have put there.
            let mut reader = FieldReader::new(payload);
            while reader.next_field()?.is_some() {}
            Ok(RelationKind::Unknown)
        }
        other => Ok(RelationKind::Unrecognized(UnrecognizedNode {
            variant_id: other,
            payload: payload.to_vec(),
        })),
    }
}

fn decode_read(payload: &[u8]) -> Result<ReadNode, DecodeError> {
    let mut source: Option<(u32, ReadSource)> = None;
    let mut unknown = UnknownFields::new();

    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        let decoded = match field_no {
            fields::read::NAMED_TABLE => ReadSource::NamedTable(decode_named_table(value)?),
            fields::read::DATA_SOURCE => ReadSource::DataSource(decode_data_source(value)?),
            // Not a oneof member; a field added by a newer revision.
            _ => {
                unknown.push(RawField { field_no, payload: value.to_vec() });
                continue;
            }
        };
        if let Some((first, _)) = source {
            return Err(DecodeError::MultipleVariants { first, second: field_no });
        }
        source = Some((field_no, decoded));
    }

    let (_, source) = source.ok_or(DecodeError::MissingVariant)?;
    Ok(ReadNode { source, unknown_fields: unknown })
}

fn decode_named_table(payload: &[u8]) -> Result<NamedTable, DecodeError> {
    let mut table = NamedTable::new("");
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::named_table::UNPARSED_IDENTIFIER => {
                table.unparsed_identifier =
                    get_str(value).map_err(|e| e.in_field("unparsed_identifier"))?;
            }
            _ => table.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(table)
}

fn decode_data_source(payload: &[u8]) -> Result<DataSource, DecodeError> {
    let mut source = DataSource::new("");
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::data_source::FORMAT => {
                source.format = get_str(value).map_err(|e| e.in_field("format"))?;
            }
            fields::data_source::SCHEMA => {
                source.schema = Some(get_str(value).map_err(|e| e.in_field("schema"))?);
            }
            fields::data_source::OPTIONS => {
                let (key, val) = decode_option_entry(value).map_err(|e| e.in_field("options"))?;
                source.options.insert(key, val);
            }
            _ => source.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(source)
}

fn decode_option_entry(payload: &[u8]) -> Result<(String, String), DecodeError> {
    let mut key = None;
    let mut value = None;
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, v)) = reader.next_field()? {
        match field_no {
            fields::option_entry::KEY => key = Some(get_str(v).map_err(|e| e.in_field("key"))?),
            fields::option_entry::VALUE => {
                value = Some(get_str(v).map_err(|e| e.in_field("value"))?);
            }
            // Entries are plain pairs; anything else is dropped.
            _ => {}
        }
    }
    Ok((key.ok_or(DecodeError::MissingField("key"))?, value.unwrap_or_default()))
}

fn decode_child(payload: &[u8], depth: usize, field: &'static str) -> Result<Box<Relation>, DecodeError> {
    decode_envelope(payload, depth + 1).map(Box::new).map_err(|e| e.in_field(field))
}

fn decode_project(payload: &[u8], depth: usize) -> Result<RelationKind, DecodeError> {
    let mut input = None;
    let mut node = ProjectNode::new(Vec::new());
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::project::INPUT => input = Some(decode_child(value, depth, "input")?),
            fields::project::EXPRESSIONS => {
                node.expressions.push(Expression::from_encoded(value.to_vec()));
            }
            _ => node.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(RelationKind::Project { node, input: input.ok_or(DecodeError::MissingField("input"))? })
}

fn decode_filter(payload: &[u8], depth: usize) -> Result<RelationKind, DecodeError> {
    let mut input = None;
    let mut condition = None;
    let mut unknown = UnknownFields::new();
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::filter::INPUT => input = Some(decode_child(value, depth, "input")?),
            fields::filter::CONDITION => {
                condition = Some(Expression::from_encoded(value.to_vec()));
            }
            _ => unknown.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    let mut node = FilterNode::new(condition.ok_or(DecodeError::MissingField("condition"))?);
    node.unknown_fields = unknown;
    Ok(RelationKind::Filter { node, input: input.ok_or(DecodeError::MissingField("input"))? })
}

fn decode_join(payload: &[u8], depth: usize) -> Result<RelationKind, DecodeError> {
    let mut left = None;
    let mut right = None;
    let mut node = JoinNode::new(JoinType::Unspecified);
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::join::LEFT => left = Some(decode_child(value, depth, "left")?),
            fields::join::RIGHT => right = Some(decode_child(value, depth, "right")?),
            fields::join::JOIN_TYPE => {
                node.join_type =
                    JoinType::from_i32(get_i32(value).map_err(|e| e.in_field("join_type"))?);
            }
            fields::join::CONDITION => {
                node.condition = Some(Expression::from_encoded(value.to_vec()));
            }
            fields::join::USING_COLUMNS => {
                node.using_columns.push(get_str(value).map_err(|e| e.in_field("using_columns"))?);
            }
            _ => node.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(RelationKind::Join {
        node: Box::new(node),
        left: left.ok_or(DecodeError::MissingField("left"))?,
        right: right.ok_or(DecodeError::MissingField("right"))?,
    })
}

fn decode_set_op(payload: &[u8], depth: usize) -> Result<RelationKind, DecodeError> {
    let mut left = None;
    let mut right = None;
    let mut node = SetOpNode::new(SetOpType::Unspecified, false, false);
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::set_op::LEFT => left = Some(decode_child(value, depth, "left")?),
            fields::set_op::RIGHT => right = Some(decode_child(value, depth, "right")?),
            fields::set_op::OP_TYPE => {
                node.op_type =
                    SetOpType::from_i32(get_i32(value).map_err(|e| e.in_field("op_type"))?);
            }
            fields::set_op::IS_ALL => {
                node.is_all = get_bool(value).map_err(|e| e.in_field("is_all"))?;
            }
            fields::set_op::BY_NAME => {
                node.by_name = get_bool(value).map_err(|e| e.in_field("by_name"))?;
            }
            _ => node.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(RelationKind::SetOp {
        node,
        left: left.ok_or(DecodeError::MissingField("left"))?,
        right: right.ok_or(DecodeError::MissingField("right"))?,
    })
}

fn decode_sort(payload: &[u8], depth: usize) -> Result<RelationKind, DecodeError> {
    let mut input = None;
    let mut node = SortNode::new(Vec::new(), false);
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::sort::INPUT => input = Some(decode_child(value, depth, "input")?),
            fields::sort::FIELDS => {
                node.fields.push(decode_sort_field(value).map_err(|e| e.in_field("fields"))?);
            }
            fields::sort::IS_GLOBAL => {
                node.is_global = get_bool(value).map_err(|e| e.in_field("is_global"))?;
            }
            _ => node.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(RelationKind::Sort { node, input: input.ok_or(DecodeError::MissingField("input"))? })
}

fn decode_sort_field(payload: &[u8]) -> Result<SortField, DecodeError> {
    let mut field = SortField {
        expression: Expression::from_encoded(Vec::new()),
        direction: SortDirection::Unspecified,
        nulls: NullOrdering::Unspecified,
        unknown_fields: UnknownFields::new(),
    };
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::sort_field::EXPRESSION => {
                field.expression = Expression::from_encoded(value.to_vec());
            }
            fields::sort_field::DIRECTION => {
                field.direction =
                    SortDirection::from_i32(get_i32(value).map_err(|e| e.in_field("direction"))?);
            }
            fields::sort_field::NULL_ORDERING => {
                field.nulls =
                    NullOrdering::from_i32(get_i32(value).map_err(|e| e.in_field("null_ordering"))?);
            }
            _ => field.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(field)
}

fn decode_limit(payload: &[u8], depth: usize) -> Result<RelationKind, DecodeError> {
    let mut input = None;
    let mut node = LimitNode::new(0);
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::limit::INPUT => input = Some(decode_child(value, depth, "input")?),
            fields::limit::LIMIT => node.limit = get_i32(value).map_err(|e| e.in_field("limit"))?,
            _ => node.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(RelationKind::Limit { node, input: input.ok_or(DecodeError::MissingField("input"))? })
}

fn decode_offset(payload: &[u8], depth: usize) -> Result<RelationKind, DecodeError> {
    let mut input = None;
    let mut node = OffsetNode::new(0);
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::offset::INPUT => input = Some(decode_child(value, depth, "input")?),
            fields::offset::OFFSET => {
                node.offset = get_i32(value).map_err(|e| e.in_field("offset"))?;
            }
            _ => node.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(RelationKind::Offset { node, input: input.ok_or(DecodeError::MissingField("input"))? })
}

fn decode_aggregate(payload: &[u8], depth: usize) -> Result<RelationKind, DecodeError> {
    let mut input = None;
    let mut node = AggregateNode::new(Vec::new(), Vec::new());
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::aggregate::INPUT => input = Some(decode_child(value, depth, "input")?),
            fields::aggregate::GROUPING_EXPRESSIONS => {
                node.grouping_expressions.push(Expression::from_encoded(value.to_vec()));
            }
            fields::aggregate::RESULT_EXPRESSIONS => {
                node.result_expressions.push(Expression::from_encoded(value.to_vec()));
            }
            _ => node.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(RelationKind::Aggregate { node, input: input.ok_or(DecodeError::MissingField("input"))? })
}

fn decode_sql(payload: &[u8]) -> Result<RelationKind, DecodeError> {
    let mut node = SqlNode::new("");
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::sql::QUERY => node.query = get_str(value).map_err(|e| e.in_field("query"))?,
            _ => node.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(RelationKind::Sql(node))
}

fn decode_local_relation(payload: &[u8]) -> Result<RelationKind, DecodeError> {
    let mut node = LocalRelationNode::new(Vec::new());
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::local_relation::ATTRIBUTES => {
                node.attributes.push(decode_attribute(value).map_err(|e| e.in_field("attributes"))?);
            }
            _ => node.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(RelationKind::LocalRelation(node))
}

fn decode_sample(payload: &[u8], depth: usize) -> Result<RelationKind, DecodeError> {
    let mut input = None;
    let mut node = SampleNode::new(0.0, 0.0, false);
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::sample::INPUT => input = Some(decode_child(value, depth, "input")?),
            fields::sample::LOWER_BOUND => {
                node.lower_bound = get_f64(value).map_err(|e| e.in_field("lower_bound"))?;
            }
            fields::sample::UPPER_BOUND => {
                node.upper_bound = get_f64(value).map_err(|e| e.in_field("upper_bound"))?;
            }
            fields::sample::WITH_REPLACEMENT => {
                node.with_replacement =
                    get_bool(value).map_err(|e| e.in_field("with_replacement"))?;
            }
            fields::sample::SEED => {
                node.seed = Some(get_i64(value).map_err(|e| e.in_field("seed"))?);
            }
            _ => node.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(RelationKind::Sample { node, input: input.ok_or(DecodeError::MissingField("input"))? })
}

fn decode_deduplicate(payload: &[u8], depth: usize) -> Result<RelationKind, DecodeError> {
    let mut input = None;
    let mut node = DeduplicateNode::on_columns(Vec::new());
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::deduplicate::INPUT => input = Some(decode_child(value, depth, "input")?),
            fields::deduplicate::COLUMN_NAMES => {
                node.column_names.push(get_str(value).map_err(|e| e.in_field("column_names"))?);
            }
            fields::deduplicate::ALL_COLUMNS_AS_KEYS => {
                node.all_columns_as_keys =
                    get_bool(value).map_err(|e| e.in_field("all_columns_as_keys"))?;
            }
            _ => node.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(RelationKind::Deduplicate { node, input: input.ok_or(DecodeError::MissingField("input"))? })
}

fn decode_range(payload: &[u8]) -> Result<RelationKind, DecodeError> {
    let mut node = RangeNode::new(0, 0, 0);
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::range::START => node.start = get_i64(value).map_err(|e| e.in_field("start"))?,
            fields::range::END => node.end = get_i64(value).map_err(|e| e.in_field("end"))?,
            fields::range::STEP => node.step = get_i64(value).map_err(|e| e.in_field("step"))?,
            fields::range::NUM_PARTITIONS => {
                node.num_partitions =
                    Some(get_i32(value).map_err(|e| e.in_field("num_partitions"))?);
            }
            _ => node.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(RelationKind::Range(node))
}

fn decode_subquery_alias(payload: &[u8], depth: usize) -> Result<RelationKind, DecodeError> {
    let mut input = None;
    let mut node = SubqueryAliasNode::new("");
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::subquery_alias::INPUT => input = Some(decode_child(value, depth, "input")?),
            fields::subquery_alias::ALIAS => {
                node.alias = get_str(value).map_err(|e| e.in_field("alias"))?;
            }
            fields::subquery_alias::QUALIFIER => {
                node.qualifier.push(get_str(value).map_err(|e| e.in_field("qualifier"))?);
            }
            _ => node.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(RelationKind::SubqueryAlias {
        node,
        input: input.ok_or(DecodeError::MissingField("input"))?,
    })
}

fn decode_repartition(payload: &[u8], depth: usize) -> Result<RelationKind, DecodeError> {
    let mut input = None;
    let mut node = RepartitionNode::new(0, false);
    let mut reader = FieldReader::new(payload);
    while let Some((field_no, value)) = reader.next_field()? {
        match field_no {
            fields::repartition::INPUT => input = Some(decode_child(value, depth, "input")?),
            fields::repartition::NUM_PARTITIONS => {
                node.num_partitions = get_i32(value).map_err(|e| e.in_field("num_partitions"))?;
            }
            fields::repartition::SHUFFLE => {
                node.shuffle = get_bool(value).map_err(|e| e.in_field("shuffle"))?;
            }
            _ => node.unknown_fields.push(RawField { field_no, payload: value.to_vec() }),
        }
    }
    Ok(RelationKind::Repartition { node, input: input.ok_or(DecodeError::MissingField("input"))? })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(bytes: &[u8]) -> Expression {
        Expression::from_encoded(bytes.to_vec())
    }

    fn round_trip(plan: &Relation) -> Relation {
        let bytes = plan.encode().unwrap();
        let decoded = Relation::decode(&bytes).unwrap();
        assert_eq!(&decoded, plan);
        decoded
    }

    #[test]
    fn version_byte_leads_the_message() {
        let bytes = Relation::sql("SELECT 1").encode().unwrap();
        assert_eq!(bytes[0], FORMAT_VERSION);
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = Relation::sql("SELECT 1").encode().unwrap();
        bytes[0] = 9;
        assert!(matches!(Relation::decode(&bytes), Err(DecodeError::UnsupportedVersion(9))));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(Relation::decode(&[]), Err(DecodeError::UnexpectedEof)));
    }

    #[test]
    fn leaf_round_trips() {
        round_trip(&Relation::named_table("users"));
        round_trip(&Relation::sql("SELECT * FROM t"));
        round_trip(&Relation::range(0, 100, 5));
        round_trip(&Relation::unknown());
    }

    #[test]
    fn data_source_round_trips_with_options() {
        let source = DataSource::new("parquet")
            .with_schema("id BIGINT, name STRING")
            .with_option("Path", "/data/users")
            .with_option("mergeSchema", "true");
        round_trip(&Relation::data_source(source));
    }

    #[test]
    fn pipeline_round_trips() {
        let plan = Relation::named_table("users")
            .filter(expr(b"\x01age"))
            .project(vec![expr(b"\x02id"), expr(b"\x02name")])
            .sort(vec![SortField::desc(expr(b"\x02id"))], true)
            .limit(10)
            .offset(5);
        round_trip(&plan);
    }

    #[test]
    fn join_round_trips() {
        let on = Relation::named_table("a").join_on(
            Relation::named_table("b"),
            JoinType::LeftOuter,
            expr(b"\x03eq"),
        );
        round_trip(&on);

        let using = Relation::named_table("a").join_using(
            Relation::named_table("b"),
            JoinType::Inner,
            vec!["id".to_owned(), "ts".to_owned()],
        );
        round_trip(&using);
    }

    #[test]
    fn common_metadata_round_trips() {
        let plan = Relation::range(0, 10, 1).with_source_info("query.sql:42");
        let decoded = round_trip(&plan);
        assert_eq!(decoded.common.as_ref().map(|c| c.source_info.as_str()), Some("query.sql:42"));
    }

    #[test]
    fn sample_seed_is_optional_on_the_wire() {
        let without = Relation::named_table("t").sample(SampleNode::new(0.0, 0.5, false));
        let with = Relation::named_table("t").sample(SampleNode::new(0.0, 0.5, false).with_seed(7));

        assert_eq!(round_trip(&without).children().len(), 1);
        round_trip(&with);
        assert!(with.encode().unwrap().len() > without.encode().unwrap().len());
    }

    #[test]
    fn missing_variant_is_an_error() {
        // Version byte and nothing else.
        let bytes = vec![FORMAT_VERSION];
        assert!(matches!(Relation::decode(&bytes), Err(DecodeError::MissingVariant)));
    }

    #[test]
    fn two_variants_are_an_error() {
        let mut bytes = vec![FORMAT_VERSION];
        put_message(&mut bytes, variant_ids::SQL, |b| put_str(b, fields::sql::QUERY, "SELECT 1"))
            .unwrap();
        put_message(&mut bytes, variant_ids::RANGE, |b| {
            put_i64(b, fields::range::START, 0)?;
            put_i64(b, fields::range::END, 1)?;
            put_i64(b, fields::range::STEP, 1)
        })
        .unwrap();

        assert!(matches!(
            Relation::decode(&bytes),
            Err(DecodeError::MultipleVariants { first: 10, second: 15 })
        ));
    }

    #[test]
    fn unknown_variant_decodes_to_unrecognized_and_reencodes_identically() {
        let mut bytes = vec![FORMAT_VERSION];
        put_field(&mut bytes, 12345, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();

        let decoded = Relation::decode(&bytes).unwrap();
        match &decoded.kind {
            RelationKind::Unrecognized(node) => {
                assert_eq!(node.variant_id, 12345);
                assert_eq!(node.payload, vec![0xDE, 0xAD, 0xBE, 0xEF]);
            }
            other => panic!("expected Unrecognized, got {other:?}"),
        }

        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn unknown_fields_in_known_message_are_preserved() {
        // A limit message with a field from a newer revision appended.
        let mut bytes = vec![FORMAT_VERSION];
        put_message(&mut bytes, variant_ids::LIMIT, |b| {
            put_message(b, fields::limit::INPUT, |inner| {
                put_message(inner, variant_ids::SQL, |sql| {
                    put_str(sql, fields::sql::QUERY, "SELECT 1")
                })
            })?;
            put_i32(b, fields::limit::LIMIT, 3)?;
            put_field(b, 99, &[7, 7, 7])
        })
        .unwrap();

        let decoded = Relation::decode(&bytes).unwrap();
        match &decoded.kind {
            RelationKind::Limit { node, .. } => {
                assert_eq!(node.limit, 3);
                assert_eq!(node.unknown_fields.len(), 1);
            }
            other => panic!("expected Limit, got {other:?}"),
        }

        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn absent_scalars_decode_to_defaults() {
        // A range message carrying only a start field.
        let mut bytes = vec![FORMAT_VERSION];
        put_message(&mut bytes, variant_ids::RANGE, |b| put_i64(b, fields::range::START, 4))
            .unwrap();

        let decoded = Relation::decode(&bytes).unwrap();
        match &decoded.kind {
            RelationKind::Range(node) => {
                assert_eq!(node.start, 4);
                assert_eq!(node.end, 0);
                assert_eq!(node.step, 0);
                assert_eq!(node.num_partitions, None);
            }
            other => panic!("expected Range, got {other:?}"),
        }
    }

    #[test]
    fn unknown_enum_value_coerces_to_unspecified() {
        let mut bytes = vec![FORMAT_VERSION];
        put_message(&mut bytes, variant_ids::JOIN, |b| {
            put_message(b, fields::join::LEFT, |l| {
                put_message(l, variant_ids::SQL, |s| put_str(s, fields::sql::QUERY, "a"))
            })?;
            put_message(b, fields::join::RIGHT, |r| {
                put_message(r, variant_ids::SQL, |s| put_str(s, fields::sql::QUERY, "b"))
            })?;
            put_i32(b, fields::join::JOIN_TYPE, 77)
        })
        .unwrap();

        let decoded = Relation::decode(&bytes).unwrap();
        match &decoded.kind {
            RelationKind::Join { node, .. } => assert_eq!(node.join_type, JoinType::Unspecified),
            other => panic!("expected Join, got {other:?}"),
        }
    }

    #[test]
    fn read_tolerates_fields_beside_the_source() {
        // A newer producer adds a field next to the Read oneof. The
        // source still decodes and the extra field survives re-encoding.
        let mut bytes = vec![FORMAT_VERSION];
        put_message(&mut bytes, variant_ids::READ, |b| {
            put_message(b, fields::read::NAMED_TABLE, |t| {
                put_str(t, fields::named_table::UNPARSED_IDENTIFIER, "users")
            })?;
            put_field(b, 7, &[1])
        })
        .unwrap();

        let decoded = Relation::decode(&bytes).unwrap();
        match &decoded.kind {
            RelationKind::Read(node) => {
                assert!(matches!(
                    &node.source,
                    ReadSource::NamedTable(t) if t.unparsed_identifier == "users"
                ));
                assert_eq!(node.unknown_fields.len(), 1);
            }
            other => panic!("expected Read, got {other:?}"),
        }

        assert_eq!(decoded.encode().unwrap(), bytes);
    }

    #[test]
    fn read_with_two_sources_is_an_error() {
        let mut bytes = vec![FORMAT_VERSION];
        put_message(&mut bytes, variant_ids::READ, |b| {
            put_message(b, fields::read::NAMED_TABLE, |t| {
                put_str(t, fields::named_table::UNPARSED_IDENTIFIER, "users")
            })?;
            put_message(b, fields::read::DATA_SOURCE, |d| {
                put_str(d, fields::data_source::FORMAT, "csv")
            })
        })
        .unwrap();

        assert!(matches!(
            Relation::decode(&bytes),
            Err(DecodeError::Context { source, .. })
                if matches!(*source, DecodeError::MultipleVariants { first: 1, second: 2 })
        ));
    }

    #[test]
    fn missing_required_child_is_an_error() {
        // A filter with a condition but no input.
        let mut bytes = vec![FORMAT_VERSION];
        put_message(&mut bytes, variant_ids::FILTER, |b| {
            put_field(b, fields::filter::CONDITION, &[1])
        })
        .unwrap();

        let err = Relation::decode(&bytes).unwrap_err();
        assert_eq!(err.to_string(), "in filter: missing required field: input");
    }

    #[test]
    fn decode_depth_is_bounded() {
        let mut plan = Relation::named_table("t");
        for _ in 0..MAX_PLAN_DEPTH {
            plan = plan.limit(1);
        }
        let bytes = plan.encode().unwrap();

        let err = Relation::decode(&bytes).unwrap_err();
        let mut cause = &err;
        while let DecodeError::Context { source, .. } = cause {
            cause = source;
        }
        assert!(matches!(cause, DecodeError::DepthExceeded { max } if *max == MAX_PLAN_DEPTH));
    }

    #[test]
    fn plan_at_depth_limit_round_trips() {
        // Exactly at the bound: must decode, not abort or error.
        let mut plan = Relation::named_table("t");
        for _ in 0..MAX_PLAN_DEPTH - 1 {
            plan = plan.limit(1);
        }
        round_trip(&plan);
    }

    #[test]
    fn truncated_nested_message_is_an_error() {
        let bytes = Relation::named_table("users").limit(5).encode().unwrap();
        let truncated = &bytes[..bytes.len() - 3];
        assert!(Relation::decode(truncated).is_err());
    }

    #[test]
    fn error_path_names_the_nested_field() {
        // A limit whose nested input holds an over-long field length.
        let mut bytes = vec![FORMAT_VERSION];
        put_message(&mut bytes, variant_ids::LIMIT, |b| {
            put_field(b, fields::limit::INPUT, &[0, 0, 0, 1])
        })
        .unwrap();

        let err = Relation::decode(&bytes).unwrap_err();
        assert_eq!(err.to_string(), "in limit: in input: unexpected end of input");
    }
}
