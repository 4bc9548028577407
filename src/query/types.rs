use bson::Bson;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CompileError;

/// Operators understood by the filter compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    And,
    Or,
    Not,
    Eq,
    Ne,
    Gte,
    Gt,
    Lt,
    Lte,
    Range,
    RangeEq,
    Between,
    BetweenEq,
    Contains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    Sort,
    Exists,
    ElemMatch,
}

impl Operator {
    pub const ALL: [Self; 21] = [
        Self::And,
        Self::Or,
        Self::Not,
        Self::Eq,
        Self::Ne,
        Self::Gte,
        Self::Gt,
        Self::Lt,
        Self::Lte,
        Self::Range,
        Self::RangeEq,
        Self::Between,
        Self::BetweenEq,
        Self::Contains,
        Self::StartsWith,
        Self::EndsWith,
        Self::In,
        Self::NotIn,
        Self::Sort,
        Self::Exists,
        Self::ElemMatch,
    ];

    /// Wire name of the operator. Range and between forms are not native
    /// MongoDB operators; they only name the node.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "$and",
            Self::Or => "$or",
            Self::Not => "$not",
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gte => "$gte",
            Self::Gt => "$gt",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::Range => "$range",
            Self::RangeEq => "rangeEq",
            Self::Between => "between",
            Self::BetweenEq => "betweenEq",
            Self::Contains => "$contains",
            Self::StartsWith => "$startwith",
            Self::EndsWith => "$endwith",
            Self::In => "$in",
            Self::NotIn => "$nin",
            Self::Sort => "$sort",
            Self::Exists => "$exists",
            Self::ElemMatch => "$elemMatch",
        }
    }

    #[must_use]
    pub const fn is_combinator(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Not)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| CompileError::UnsupportedOperator(s.to_string()))
    }
}

/// Payload carried by a filter node. The variant is fixed by the builder
/// that created the node.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Scalar(Bson),
    Pair(Bson, Bson),
    List(Vec<Bson>),
    Texts(Vec<String>),
    Text(String),
    Flag(bool),
    Direction(i32),
    Nested(Box<Filter>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    field: String,
    op: Operator,
    operand: Operand,
    children: Vec<Filter>,
}

impl Filter {
    fn leaf(field: impl Into<String>, op: Operator, operand: Operand) -> Self {
        Self { field: field.into(), op, operand, children: Vec::new() }
    }

    fn combinator(op: Operator, children: Vec<Self>) -> Self {
        Self { field: String::new(), op, operand: Operand::None, children }
    }

    #[must_use]
    pub fn and(items: Vec<Self>) -> Self {
        Self::combinator(Operator::And, items)
    }

    #[must_use]
    pub fn or(items: Vec<Self>) -> Self {
        Self::combinator(Operator::Or, items)
    }

    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(item: Self) -> Self {
        Self::combinator(Operator::Not, vec![item])
    }

    #[allow(clippy::should_implement_trait)]
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(field, Operator::Eq, Operand::Scalar(value.into()))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(field, Operator::Ne, Operand::Scalar(value.into()))
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(field, Operator::Gte, Operand::Scalar(value.into()))
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(field, Operator::Gt, Operand::Scalar(value.into()))
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(field, Operator::Lt, Operand::Scalar(value.into()))
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(field, Operator::Lte, Operand::Scalar(value.into()))
    }

    /// Exclusive range: `from < field < to`.
    pub fn range(field: impl Into<String>, from: impl Into<Bson>, to: impl Into<Bson>) -> Self {
        Self::leaf(field, Operator::Range, Operand::Pair(from.into(), to.into()))
    }

    /// Inclusive range: `from <= field <= to`.
    pub fn range_eq(field: impl Into<String>, from: impl Into<Bson>, to: impl Into<Bson>) -> Self {
        Self::leaf(field, Operator::RangeEq, Operand::Pair(from.into(), to.into()))
    }

    pub fn between(field: impl Into<String>, gt: impl Into<Bson>, lt: impl Into<Bson>) -> Self {
        Self::leaf(field, Operator::Between, Operand::Pair(gt.into(), lt.into()))
    }

    pub fn between_eq(
        field: impl Into<String>,
        gte: impl Into<Bson>,
        lte: impl Into<Bson>,
    ) -> Self {
        Self::leaf(field, Operator::BetweenEq, Operand::Pair(gte.into(), lte.into()))
    }

    pub fn in_<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self::leaf(field, Operator::In, Operand::List(values))
    }

    pub fn nin<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self::leaf(field, Operator::NotIn, Operand::List(values))
    }

    /// Case-insensitive substring match; several values are alternatives.
    pub fn contains<S: Into<String>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self::leaf(field, Operator::Contains, Operand::Texts(values))
    }

    pub fn starts_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::leaf(field, Operator::StartsWith, Operand::Text(value.into()))
    }

    pub fn ends_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::leaf(field, Operator::EndsWith, Operand::Text(value.into()))
    }

    /// Matches documents that contain (or lack) `field`.
    pub fn exists(field: impl Into<String>, value: bool) -> Self {
        Self::leaf(field, Operator::Exists, Operand::Flag(value))
    }

    /// Matches array elements of `field` against `filter`.
    pub fn elem_match(field: impl Into<String>, filter: Self) -> Self {
        Self::leaf(field, Operator::ElemMatch, Operand::Nested(Box::new(filter)))
    }

    /// Sort marker; `"asc"` (any case) sorts ascending, anything else descending.
    pub fn sort(field: impl Into<String>, sort_type: &str) -> Self {
        let dir = Order::from_label(sort_type).direction();
        Self::leaf(field, Operator::Sort, Operand::Direction(dir))
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub const fn op(&self) -> Operator {
        self.op
    }

    #[must_use]
    pub const fn operand(&self) -> &Operand {
        &self.operand
    }

    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Direction carried by a sort marker, `None` for every other node.
    #[must_use]
    pub const fn direction(&self) -> Option<i32> {
        match self.operand {
            Operand::Direction(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("asc") { Self::Asc } else { Self::Desc }
    }

    #[must_use]
    pub const fn from_ascending(ascending: bool) -> Self {
        if ascending { Self::Asc } else { Self::Desc }
    }

    #[must_use]
    pub const fn direction(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, ascending: bool) -> Self {
        Self { field: field.into(), order: Order::from_ascending(ascending) }
    }
}

/// One `$switch` branch: the first case whose condition matches yields `then`.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub case: Filter,
    pub then: Bson,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchParams {
    pub cases: Vec<SwitchCase>,
    pub default: Bson,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: u64,
}
