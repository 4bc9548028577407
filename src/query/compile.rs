use bson::{Bson, Document, doc};

use super::types::{Filter, Operand, Operator};
use crate::errors::CompileError;

impl Filter {
    /// Compiles this node into a MongoDB filter document.
    ///
    /// # Errors
    /// See [`build_filter`].
    pub fn compile(&self) -> Result<Document, CompileError> {
        build_filter(self)
    }
}

/// Compiles a filter tree into the nested document MongoDB expects for
/// `$match` and `find`.
///
/// # Errors
/// Returns `CompileError::MalformedOperand` when a node carries the wrong
/// shape for its operator (a combinator without children, a comparison
/// without a field, an empty `contains`), and
/// `CompileError::UnsupportedBoundType` when range bounds are neither
/// numeric nor timestamps.
pub fn build_filter(filter: &Filter) -> Result<Document, CompileError> {
    let op = filter.op();
    match (op, filter.operand()) {
        (Operator::And | Operator::Or, _) => {
            if filter.children().is_empty() {
                return Err(CompileError::malformed(op.as_str(), "requires at least one child"));
            }
            let items = filter
                .children()
                .iter()
                .map(|child| build_filter(child).map(Bson::Document))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(doc! { op.as_str(): items })
        }
        (Operator::Not, _) => {
            let [inner] = filter.children() else {
                return Err(CompileError::malformed(op.as_str(), "requires exactly one child"));
            };
            log::debug!("compiling negation of {} as $nor", inner.op());
            Ok(doc! { "$nor": [build_filter(inner)?] })
        }
        (
            Operator::Eq
            | Operator::Ne
            | Operator::Gt
            | Operator::Gte
            | Operator::Lt
            | Operator::Lte
            | Operator::In
            | Operator::NotIn
            | Operator::Exists
            | Operator::Sort,
            operand,
        ) => {
            let field = require_field(filter)?;
            let value = match operand {
                Operand::Scalar(v) => v.clone(),
                Operand::List(vs) => Bson::Array(vs.clone()),
                Operand::Flag(b) => Bson::Boolean(*b),
                Operand::Direction(d) => Bson::Int32(*d),
                other => return Err(shape_error(op, other)),
            };
            Ok(doc! { field: { op.as_str(): value } })
        }
        (Operator::Range | Operator::Between, Operand::Pair(lo, hi)) => {
            let field = require_field(filter)?;
            check_bounds(op, lo, hi)?;
            Ok(doc! { field: { "$gt": lo.clone(), "$lt": hi.clone() } })
        }
        (Operator::RangeEq | Operator::BetweenEq, Operand::Pair(lo, hi)) => {
            let field = require_field(filter)?;
            check_bounds(op, lo, hi)?;
            Ok(doc! { field: { "$gte": lo.clone(), "$lte": hi.clone() } })
        }
        (Operator::StartsWith, Operand::Text(text)) => {
            let field = require_field(filter)?;
            Ok(regex_match(field, format!("^{}.*$", regex::escape(text))))
        }
        (Operator::EndsWith, Operand::Text(text)) => {
            let field = require_field(filter)?;
            Ok(regex_match(field, format!("^.*{}$", regex::escape(text))))
        }
        (Operator::Contains, Operand::Texts(texts)) => {
            let field = require_field(filter)?;
            match texts.as_slice() {
                [] => Err(CompileError::malformed(op.as_str(), "requires at least one value")),
                [single] => Ok(regex_match(field, contains_pattern(single))),
                many => {
                    let alternatives: Vec<Bson> = many
                        .iter()
                        .map(|t| Bson::Document(regex_match(field, contains_pattern(t))))
                        .collect();
                    Ok(doc! { "$or": alternatives })
                }
            }
        }
        (Operator::ElemMatch, Operand::Nested(inner)) => {
            let field = require_field(filter)?;
            Ok(doc! { field: { op.as_str(): build_filter(inner)? } })
        }
        (
            Operator::Range
            | Operator::RangeEq
            | Operator::Between
            | Operator::BetweenEq
            | Operator::StartsWith
            | Operator::EndsWith
            | Operator::Contains
            | Operator::ElemMatch,
            other,
        ) => Err(shape_error(op, other)),
    }
}

fn require_field(filter: &Filter) -> Result<&str, CompileError> {
    if filter.field().is_empty() {
        Err(CompileError::malformed(filter.op().as_str(), "field must not be empty"))
    } else {
        Ok(filter.field())
    }
}

fn shape_error(op: Operator, operand: &Operand) -> CompileError {
    let found = match operand {
        Operand::None => "no value",
        Operand::Scalar(_) => "a scalar",
        Operand::Pair(..) => "a bound pair",
        Operand::List(_) => "a value list",
        Operand::Texts(_) => "a text list",
        Operand::Text(_) => "a text",
        Operand::Flag(_) => "a flag",
        Operand::Direction(_) => "a sort direction",
        Operand::Nested(_) => "a nested filter",
    };
    CompileError::malformed(op.as_str(), format!("unexpected {found}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundKind {
    Numeric,
    Temporal,
}

fn bound_kind(op: Operator, b: &Bson) -> Result<BoundKind, CompileError> {
    match b {
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => Ok(BoundKind::Numeric),
        Bson::DateTime(_) => Ok(BoundKind::Temporal),
        other => Err(CompileError::UnsupportedBoundType {
            op: op.as_str(),
            found: format!("{:?}", other.element_type()),
        }),
    }
}

fn check_bounds(op: Operator, lo: &Bson, hi: &Bson) -> Result<(), CompileError> {
    let lo_kind = bound_kind(op, lo)?;
    let hi_kind = bound_kind(op, hi)?;
    if lo_kind == hi_kind {
        Ok(())
    } else {
        Err(CompileError::malformed(op.as_str(), "bounds must share a type"))
    }
}

fn contains_pattern(text: &str) -> String {
    format!(".*{}.*", regex::escape(text))
}

fn regex_match(field: &str, pattern: String) -> Document {
    doc! { field: { "$regex": pattern, "$options": "i" } }
}
