use bson::Bson;
use serde::{Deserialize, Serialize};

use super::types::{Filter, Operator};
use crate::errors::{CompileError, DbError};

// Guards against pathological input from untrusted JSON
pub(crate) const MAX_FILTER_DEPTH: usize = 64;
pub(crate) const MAX_IN_SET: usize = 1000;

/// JSON shape of a filter node: `{"op": "$gt", "field": "age", "value": 30}`.
/// Combinators carry `items`; `$elemMatch` carries its inner filter in `value`.
/// Values are extended JSON, so `{"$date": "..."}` yields a timestamp bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSerde {
    pub op: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub items: Vec<FilterSerde>,
}

impl TryFrom<FilterSerde> for Filter {
    type Error = CompileError;

    fn try_from(fs: FilterSerde) -> Result<Self, Self::Error> {
        convert(fs, 0)
    }
}

fn convert(fs: FilterSerde, depth: usize) -> Result<Filter, CompileError> {
    let op: Operator = fs.op.parse()?;
    if depth > MAX_FILTER_DEPTH {
        return Err(CompileError::malformed(op.as_str(), "filter nested too deeply"));
    }
    let FilterSerde { field, value, items, .. } = fs;
    let children = || {
        items
            .into_iter()
            .map(|item| convert(item, depth + 1))
            .collect::<Result<Vec<_>, _>>()
    };
    Ok(match op {
        Operator::And => Filter::and(children()?),
        Operator::Or => Filter::or(children()?),
        Operator::Not => {
            let mut inner = children()?;
            if inner.len() != 1 {
                return Err(CompileError::malformed(op.as_str(), "requires exactly one item"));
            }
            Filter::not(inner.remove(0))
        }
        Operator::Eq => Filter::eq(field, scalar(op, value)?),
        Operator::Ne => Filter::ne(field, scalar(op, value)?),
        Operator::Gt => Filter::gt(field, scalar(op, value)?),
        Operator::Gte => Filter::gte(field, scalar(op, value)?),
        Operator::Lt => Filter::lt(field, scalar(op, value)?),
        Operator::Lte => Filter::lte(field, scalar(op, value)?),
        Operator::Range => {
            let (lo, hi) = pair(op, value)?;
            Filter::range(field, lo, hi)
        }
        Operator::RangeEq => {
            let (lo, hi) = pair(op, value)?;
            Filter::range_eq(field, lo, hi)
        }
        Operator::Between => {
            let (lo, hi) = pair(op, value)?;
            Filter::between(field, lo, hi)
        }
        Operator::BetweenEq => {
            let (lo, hi) = pair(op, value)?;
            Filter::between_eq(field, lo, hi)
        }
        Operator::In => Filter::in_(field, list(op, value)?),
        Operator::NotIn => Filter::nin(field, list(op, value)?),
        Operator::Contains => Filter::contains(field, texts(op, value)?),
        Operator::StartsWith => Filter::starts_with(field, text(op, value)?),
        Operator::EndsWith => Filter::ends_with(field, text(op, value)?),
        Operator::Exists => match value {
            Some(serde_json::Value::Bool(b)) => Filter::exists(field, b),
            _ => return Err(CompileError::malformed(op.as_str(), "expects a boolean")),
        },
        Operator::ElemMatch => {
            let inner = value
                .ok_or_else(|| CompileError::malformed(op.as_str(), "expects a nested filter"))?;
            let inner: FilterSerde = serde_json::from_value(inner)
                .map_err(|e| CompileError::malformed(op.as_str(), e.to_string()))?;
            Filter::elem_match(field, convert(inner, depth + 1)?)
        }
        Operator::Sort => match value {
            Some(serde_json::Value::String(s)) => Filter::sort(field, &s),
            _ => return Err(CompileError::malformed(op.as_str(), "expects \"asc\" or \"desc\"")),
        },
    })
}

fn to_bson(op: Operator, v: serde_json::Value) -> Result<Bson, CompileError> {
    Bson::try_from(v).map_err(|e| CompileError::malformed(op.as_str(), e.to_string()))
}

fn scalar(op: Operator, value: Option<serde_json::Value>) -> Result<Bson, CompileError> {
    value
        .ok_or_else(|| CompileError::malformed(op.as_str(), "missing value"))
        .and_then(|v| to_bson(op, v))
}

fn pair(op: Operator, value: Option<serde_json::Value>) -> Result<(Bson, Bson), CompileError> {
    match value {
        Some(serde_json::Value::Array(items)) if items.len() == 2 => {
            let mut it = items.into_iter();
            match (it.next(), it.next()) {
                (Some(lo), Some(hi)) => Ok((to_bson(op, lo)?, to_bson(op, hi)?)),
                _ => Err(CompileError::malformed(op.as_str(), "expects a two-element array")),
            }
        }
        _ => Err(CompileError::malformed(op.as_str(), "expects a two-element array")),
    }
}

fn list(op: Operator, value: Option<serde_json::Value>) -> Result<Vec<Bson>, CompileError> {
    match value {
        Some(serde_json::Value::Array(items)) if items.len() > MAX_IN_SET => Err(
            CompileError::malformed(op.as_str(), format!("more than {MAX_IN_SET} values")),
        ),
        Some(serde_json::Value::Array(items)) => items.into_iter().map(|v| to_bson(op, v)).collect(),
        _ => Err(CompileError::malformed(op.as_str(), "expects an array")),
    }
}

fn text(op: Operator, value: Option<serde_json::Value>) -> Result<String, CompileError> {
    match value {
        Some(serde_json::Value::String(s)) => Ok(s),
        _ => Err(CompileError::malformed(op.as_str(), "expects a string")),
    }
}

fn texts(op: Operator, value: Option<serde_json::Value>) -> Result<Vec<String>, CompileError> {
    match value {
        Some(serde_json::Value::String(s)) => Ok(vec![s]),
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => Ok(s),
                _ => Err(CompileError::malformed(op.as_str(), "expects strings")),
            })
            .collect(),
        _ => Err(CompileError::malformed(op.as_str(), "expects a string or array of strings")),
    }
}

/// # Errors
/// Returns an error if the JSON string is not a filter node or a node is
/// malformed for its operator.
pub fn parse_filter_json(json: &str) -> Result<Filter, DbError> {
    let fs: FilterSerde = serde_json::from_str(json)?;
    Ok(Filter::try_from(fs)?)
}
