//! Relational plan nodes.
//!
//! This module defines the per-variant field structs of the operator
//! catalog (`Read`, `Project`, `Filter`, `Join`, ...) and the wire enums
//! they reference. Child plans are not stored here; they live on the
//! [`RelationKind`](super::RelationKind) variants.
//!
//! Every enum reserves wire value `0` as an explicit `Unspecified`
//! sentinel. Consumers must treat it as absent/invalid, never silently
//! coerce it to the first real member.

// Allow missing_const_for_fn - const fn with Vec isn't stable
#![allow(clippy::missing_const_for_fn)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::encoding::UnknownFields;
use crate::expr::{Expression, QualifiedAttribute};
use crate::options::OptionMap;

/// A read leaf.
///
/// The source discriminant is the read's own oneof; fields a newer
/// schema revision adds next to it are preserved in `unknown_fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadNode {
    /// Where the rows come from.
    pub source: ReadSource,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

/// The source of a `Read`: a catalog table or an external data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadSource {
    /// Read a table known to the engine's catalog.
    NamedTable(NamedTable),
    /// Read an external data source through a format implementation.
    DataSource(DataSource),
}

impl ReadNode {
    /// Creates a named-table read.
    #[must_use]
    pub fn named_table(identifier: impl Into<String>) -> Self {
        Self {
            source: ReadSource::NamedTable(NamedTable::new(identifier)),
            unknown_fields: UnknownFields::new(),
        }
    }

    /// Creates a data-source read.
    #[must_use]
    pub fn data_source(source: DataSource) -> Self {
        Self { source: ReadSource::DataSource(source), unknown_fields: UnknownFields::new() }
    }
}

/// A reference to a catalog table by its unparsed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedTable {
    /// The table identifier, unparsed (may be multi-part, e.g. `db.t`).
    pub unparsed_identifier: String,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl NamedTable {
    /// Creates a named-table reference.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self { unparsed_identifier: identifier.into(), unknown_fields: UnknownFields::new() }
    }
}

/// An external data source read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    /// The format implementation to use (e.g. `parquet`, `csv`).
    pub format: String,
    /// Optional schema text in the engine's schema syntax.
    pub schema: Option<String>,
    /// Format-specific options; keys compare case-insensitively.
    pub options: OptionMap,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl DataSource {
    /// Creates a data-source read for the given format.
    #[must_use]
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            schema: None,
            options: OptionMap::new(),
            unknown_fields: UnknownFields::new(),
        }
    }

    /// Sets the schema text.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Adds one option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key, value);
        self
    }
}

/// A projection node: the ordered output expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectNode {
    /// The expressions to project, in output order.
    pub expressions: Vec<Expression>,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl ProjectNode {
    /// Creates a new projection node.
    #[must_use]
    pub fn new(expressions: Vec<Expression>) -> Self {
        Self { expressions, unknown_fields: UnknownFields::new() }
    }
}

/// A filter node: one boolean condition expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterNode {
    /// The predicate to filter by.
    pub condition: Expression,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl FilterNode {
    /// Creates a new filter node.
    #[must_use]
    pub fn new(condition: Expression) -> Self {
        Self { condition, unknown_fields: UnknownFields::new() }
    }
}

/// Join type for join operations.
///
/// Wire value 0 is the unspecified sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    /// No join type was set.
    Unspecified,
    /// INNER JOIN.
    Inner,
    /// FULL OUTER JOIN.
    FullOuter,
    /// LEFT OUTER JOIN.
    LeftOuter,
    /// RIGHT OUTER JOIN.
    RightOuter,
    /// LEFT ANTI JOIN (left rows without a match).
    LeftAnti,
    /// LEFT SEMI JOIN (left rows with a match).
    LeftSemi,
}

impl JoinType {
    /// The permanent wire value of this member.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Unspecified => 0,
            Self::Inner => 1,
            Self::FullOuter => 2,
            Self::LeftOuter => 3,
            Self::RightOuter => 4,
            Self::LeftAnti => 5,
            Self::LeftSemi => 6,
        }
    }

    /// Maps a wire value back to a member. Values this build does not
    /// know decode as [`JoinType::Unspecified`].
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::Inner,
            2 => Self::FullOuter,
            3 => Self::LeftOuter,
            4 => Self::RightOuter,
            5 => Self::LeftAnti,
            6 => Self::LeftSemi,
            _ => Self::Unspecified,
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::Inner => "INNER",
            Self::FullOuter => "FULL OUTER",
            Self::LeftOuter => "LEFT OUTER",
            Self::RightOuter => "RIGHT OUTER",
            Self::LeftAnti => "LEFT ANTI",
            Self::LeftSemi => "LEFT SEMI",
        };
        write!(f, "{name}")
    }
}

/// A join node.
///
/// `condition` and a non-empty `using_columns` are mutually exclusive;
/// the validator rejects plans that set both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinNode {
    /// The type of join.
    pub join_type: JoinType,
    /// The join condition expression, if joining with ON.
    pub condition: Option<Expression>,
    /// Column names shared by both sides, if joining with USING.
    pub using_columns: Vec<String>,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl JoinNode {
    /// Creates a join with no condition (a cross-style join).
    #[must_use]
    pub fn new(join_type: JoinType) -> Self {
        Self {
            join_type,
            condition: None,
            using_columns: Vec::new(),
            unknown_fields: UnknownFields::new(),
        }
    }

    /// Creates a join with an ON condition.
    #[must_use]
    pub fn on(join_type: JoinType, condition: Expression) -> Self {
        Self {
            join_type,
            condition: Some(condition),
            using_columns: Vec::new(),
            unknown_fields: UnknownFields::new(),
        }
    }

    /// Creates a join with a USING column list.
    #[must_use]
    pub fn using(join_type: JoinType, columns: Vec<String>) -> Self {
        Self {
            join_type,
            condition: None,
            using_columns: columns,
            unknown_fields: UnknownFields::new(),
        }
    }
}

/// Set operation type.
///
/// Wire value 0 is the unspecified sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOpType {
    /// No set operation type was set.
    Unspecified,
    /// INTERSECT.
    Intersect,
    /// UNION.
    Union,
    /// EXCEPT.
    Except,
}

impl SetOpType {
    /// The permanent wire value of this member.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Unspecified => 0,
            Self::Intersect => 1,
            Self::Union => 2,
            Self::Except => 3,
        }
    }

    /// Maps a wire value back to a member. Unknown values decode as
    /// [`SetOpType::Unspecified`].
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::Intersect,
            2 => Self::Union,
            3 => Self::Except,
            _ => Self::Unspecified,
        }
    }
}

impl fmt::Display for SetOpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::Intersect => "INTERSECT",
            Self::Union => "UNION",
            Self::Except => "EXCEPT",
        };
        write!(f, "{name}")
    }
}

/// A set operation node (UNION, INTERSECT, EXCEPT).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOpNode {
    /// The type of set operation.
    pub op_type: SetOpType,
    /// Whether duplicates are kept (the ALL form).
    pub is_all: bool,
    /// Whether columns are matched by name instead of position.
    pub by_name: bool,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl SetOpNode {
    /// Creates a new set operation node.
    #[must_use]
    pub fn new(op_type: SetOpType, is_all: bool, by_name: bool) -> Self {
        Self { op_type, is_all, by_name, unknown_fields: UnknownFields::new() }
    }
}

/// Sort direction for one sort field.
///
/// Wire value 0 is the unspecified sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    /// No direction was set.
    Unspecified,
    /// Ascending order.
    Ascending,
    /// Descending order.
    Descending,
}

impl SortDirection {
    /// The permanent wire value of this member.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Unspecified => 0,
            Self::Ascending => 1,
            Self::Descending => 2,
        }
    }

    /// Maps a wire value back to a member. Unknown values decode as
    /// [`SortDirection::Unspecified`].
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::Ascending,
            2 => Self::Descending,
            _ => Self::Unspecified,
        }
    }
}

/// Where nulls sort relative to non-null values.
///
/// Wire value 0 is the unspecified sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullOrdering {
    /// No null ordering was set.
    Unspecified,
    /// Nulls sort before all other values.
    NullsFirst,
    /// Nulls sort after all other values.
    NullsLast,
}

impl NullOrdering {
    /// The permanent wire value of this member.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Unspecified => 0,
            Self::NullsFirst => 1,
            Self::NullsLast => 2,
        }
    }

    /// Maps a wire value back to a member. Unknown values decode as
    /// [`NullOrdering::Unspecified`].
    #[must_use]
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::NullsFirst,
            2 => Self::NullsLast,
            _ => Self::Unspecified,
        }
    }
}

/// One sort key: an expression with direction and null placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    /// The expression to sort by.
    pub expression: Expression,
    /// Sort direction.
    pub direction: SortDirection,
    /// Null placement.
    pub nulls: NullOrdering,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl SortField {
    /// Creates an ascending sort field with nulls first.
    #[must_use]
    pub fn asc(expression: Expression) -> Self {
        Self {
            expression,
            direction: SortDirection::Ascending,
            nulls: NullOrdering::NullsFirst,
            unknown_fields: UnknownFields::new(),
        }
    }

    /// Creates a descending sort field with nulls last.
    #[must_use]
    pub fn desc(expression: Expression) -> Self {
        Self {
            expression,
            direction: SortDirection::Descending,
            nulls: NullOrdering::NullsLast,
            unknown_fields: UnknownFields::new(),
        }
    }

    /// Sets the null placement.
    #[must_use]
    pub fn with_nulls(mut self, nulls: NullOrdering) -> Self {
        self.nulls = nulls;
        self
    }
}

/// A sort node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortNode {
    /// Sort keys, most significant first.
    pub fields: Vec<SortField>,
    /// Whether the sort is global across partitions or per-partition.
    pub is_global: bool,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl SortNode {
    /// Creates a new sort node.
    #[must_use]
    pub fn new(fields: Vec<SortField>, is_global: bool) -> Self {
        Self { fields, is_global, unknown_fields: UnknownFields::new() }
    }
}

/// A limit node: the maximum number of rows to return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitNode {
    /// Maximum number of rows; must be non-negative.
    pub limit: i32,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl LimitNode {
    /// Creates a new limit node.
    #[must_use]
    pub fn new(limit: i32) -> Self {
        Self { limit, unknown_fields: UnknownFields::new() }
    }
}

/// An offset node: the number of rows to skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetNode {
    /// Number of rows to skip; must be non-negative.
    pub offset: i32,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl OffsetNode {
    /// Creates a new offset node.
    #[must_use]
    pub fn new(offset: i32) -> Self {
        Self { offset, unknown_fields: UnknownFields::new() }
    }
}

/// An aggregate node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateNode {
    /// Grouping expressions, in order.
    pub grouping_expressions: Vec<Expression>,
    /// Result expressions, in output order.
    pub result_expressions: Vec<Expression>,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl AggregateNode {
    /// Creates a new aggregate node.
    #[must_use]
    pub fn new(grouping_expressions: Vec<Expression>, result_expressions: Vec<Expression>) -> Self {
        Self { grouping_expressions, result_expressions, unknown_fields: UnknownFields::new() }
    }
}

/// A raw SQL leaf: query text the engine parses itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlNode {
    /// The raw query text.
    pub query: String,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl SqlNode {
    /// Creates a new SQL leaf.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), unknown_fields: UnknownFields::new() }
    }
}

/// A local relation leaf: schema only, no inline row data in this
/// version of the format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRelationNode {
    /// The attribute descriptors declaring the relation's columns.
    pub attributes: Vec<QualifiedAttribute>,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl LocalRelationNode {
    /// Creates a new local relation leaf.
    #[must_use]
    pub fn new(attributes: Vec<QualifiedAttribute>) -> Self {
        Self { attributes, unknown_fields: UnknownFields::new() }
    }
}

/// A sample node: a fraction of the input rows.
///
/// Bound ordering (`lower_bound <= upper_bound`) is the producer's
/// responsibility; the validator checks presence only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleNode {
    /// Lower bound of the sampled fraction.
    pub lower_bound: f64,
    /// Upper bound of the sampled fraction.
    pub upper_bound: f64,
    /// Whether rows may be sampled more than once.
    pub with_replacement: bool,
    /// Optional seed for deterministic sampling.
    pub seed: Option<i64>,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl SampleNode {
    /// Creates a new sample node.
    #[must_use]
    pub fn new(lower_bound: f64, upper_bound: f64, with_replacement: bool) -> Self {
        Self {
            lower_bound,
            upper_bound,
            with_replacement,
            seed: None,
            unknown_fields: UnknownFields::new(),
        }
    }

    /// Sets the sampling seed.
    #[must_use]
    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// A deduplicate node.
///
/// `all_columns_as_keys` and a non-empty `column_names` subset are
/// mutually exclusive; the validator rejects plans that set both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeduplicateNode {
    /// The column subset to deduplicate on.
    pub column_names: Vec<String>,
    /// Whether every column is a deduplication key.
    pub all_columns_as_keys: bool,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl DeduplicateNode {
    /// Creates a deduplicate over a column subset.
    #[must_use]
    pub fn on_columns(column_names: Vec<String>) -> Self {
        Self { column_names, all_columns_as_keys: false, unknown_fields: UnknownFields::new() }
    }

    /// Creates a deduplicate treating every column as a key.
    #[must_use]
    pub fn all_columns() -> Self {
        Self {
            column_names: Vec::new(),
            all_columns_as_keys: true,
            unknown_fields: UnknownFields::new(),
        }
    }
}

/// A range leaf: a generated sequence of 64-bit integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeNode {
    /// First value of the sequence. Defaults to 0.
    pub start: i64,
    /// Exclusive end of the sequence.
    pub end: i64,
    /// Step between values; must not be zero.
    pub step: i64,
    /// Explicit partition count; `None` means the engine default, which
    /// is distinct from zero partitions.
    pub num_partitions: Option<i32>,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl RangeNode {
    /// Creates a new range leaf.
    #[must_use]
    pub fn new(start: i64, end: i64, step: i64) -> Self {
        Self { start, end, step, num_partitions: None, unknown_fields: UnknownFields::new() }
    }

    /// Sets an explicit partition count.
    #[must_use]
    pub fn with_num_partitions(mut self, num_partitions: i32) -> Self {
        self.num_partitions = Some(num_partitions);
        self
    }
}

/// A subquery alias node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubqueryAliasNode {
    /// The alias name.
    pub alias: String,
    /// Qualifier parts, outermost first.
    pub qualifier: Vec<String>,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl SubqueryAliasNode {
    /// Creates a new alias node.
    #[must_use]
    pub fn new(alias: impl Into<String>) -> Self {
        Self { alias: alias.into(), qualifier: Vec::new(), unknown_fields: UnknownFields::new() }
    }

    /// Sets the qualifier parts.
    #[must_use]
    pub fn with_qualifier(mut self, qualifier: Vec<String>) -> Self {
        self.qualifier = qualifier;
        self
    }
}

/// A repartition node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepartitionNode {
    /// The target partition count; must be positive.
    pub num_partitions: i32,
    /// Whether a shuffle is forced.
    pub shuffle: bool,
    /// Fields from newer schema versions, preserved for re-serialization.
    pub unknown_fields: UnknownFields,
}

impl RepartitionNode {
    /// Creates a new repartition node.
    #[must_use]
    pub fn new(num_partitions: i32, shuffle: bool) -> Self {
        Self { num_partitions, shuffle, unknown_fields: UnknownFields::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_builder() {
        let source = DataSource::new("parquet")
            .with_schema("id BIGINT, name STRING")
            .with_option("Path", "/data/users.parquet");

        assert_eq!(source.format, "parquet");
        assert_eq!(source.schema.as_deref(), Some("id BIGINT, name STRING"));
        assert_eq!(source.options.get("path"), Some("/data/users.parquet"));
    }

    #[test]
    fn join_constructors() {
        let on = JoinNode::on(JoinType::Inner, Expression::from_encoded(vec![1]));
        assert!(on.condition.is_some());
        assert!(on.using_columns.is_empty());

        let using = JoinNode::using(JoinType::LeftOuter, vec!["id".to_owned()]);
        assert!(using.condition.is_none());
        assert_eq!(using.using_columns, vec!["id"]);
    }

    #[test]
    fn enum_wire_values_are_permanent() {
        assert_eq!(JoinType::Inner.as_i32(), 1);
        assert_eq!(JoinType::LeftSemi.as_i32(), 6);
        assert_eq!(SetOpType::Except.as_i32(), 3);
        assert_eq!(SortDirection::Descending.as_i32(), 2);
        assert_eq!(NullOrdering::NullsLast.as_i32(), 2);
    }

    #[test]
    fn enum_zero_is_unspecified() {
        assert_eq!(JoinType::from_i32(0), JoinType::Unspecified);
        assert_eq!(SetOpType::from_i32(0), SetOpType::Unspecified);
        assert_eq!(SortDirection::from_i32(0), SortDirection::Unspecified);
        assert_eq!(NullOrdering::from_i32(0), NullOrdering::Unspecified);
    }

    #[test]
    fn unknown_enum_values_decode_as_unspecified() {
        assert_eq!(JoinType::from_i32(42), JoinType::Unspecified);
        assert_eq!(SetOpType::from_i32(-1), SetOpType::Unspecified);
    }

    #[test]
    fn deduplicate_constructors() {
        let subset = DeduplicateNode::on_columns(vec!["id".to_owned()]);
        assert!(!subset.all_columns_as_keys);

        let all = DeduplicateNode::all_columns();
        assert!(all.all_columns_as_keys);
        assert!(all.column_names.is_empty());
    }

    #[test]
    fn range_partitions_default_to_engine_choice() {
        let range = RangeNode::new(0, 100, 5);
        assert_eq!(range.num_partitions, None);

        let explicit = range.with_num_partitions(4);
        assert_eq!(explicit.num_partitions, Some(4));
    }

    #[test]
    fn sort_field_builders() {
        let asc = SortField::asc(Expression::from_encoded(vec![2]));
        assert_eq!(asc.direction, SortDirection::Ascending);
        assert_eq!(asc.nulls, NullOrdering::NullsFirst);

        let desc = SortField::desc(Expression::from_encoded(vec![3]))
            .with_nulls(NullOrdering::NullsFirst);
        assert_eq!(desc.direction, SortDirection::Descending);
        assert_eq!(desc.nulls, NullOrdering::NullsFirst);
    }
}
