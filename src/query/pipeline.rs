//! Aggregation stage builders. Each function returns one single-key stage
//! document ready to be pushed into a pipeline.

use bson::{Bson, Document, doc};

use super::compile::build_filter;
use super::types::{Filter, Order, SortSpec, SwitchParams};
use crate::errors::CompileError;

/// `$unwind` an array field. The path must carry its `$` prefix.
#[must_use]
pub fn pipe_unwind(path: &str, preserve_null_and_empty: bool) -> Document {
    doc! {
        "$unwind": {
            "path": path,
            "preserveNullAndEmptyArrays": preserve_null_and_empty,
        }
    }
}

/// # Errors
/// Propagates any `CompileError` from the filter.
pub fn pipe_match(filter: &Filter) -> Result<Document, CompileError> {
    Ok(doc! { "$match": build_filter(filter)? })
}

/// `$lookup` join against another collection.
#[must_use]
pub fn pipe_lookup(from: &str, local_field: &str, foreign_field: &str, as_field: &str) -> Document {
    doc! {
        "$lookup": {
            "from": from,
            "localField": local_field,
            "foreignField": foreign_field,
            "as": as_field,
        }
    }
}

#[must_use]
pub fn pipe_limit(limit: i64) -> Document {
    doc! { "$limit": limit }
}

#[must_use]
pub fn pipe_skip(skip: i64) -> Document {
    doc! { "$skip": skip }
}

#[must_use]
pub fn pipe_sort(field: &str, ascending: bool) -> Document {
    doc! { "$sort": { field: Order::from_ascending(ascending).direction() } }
}

/// Multi-field `$sort`; a repeated field takes the last direction.
#[must_use]
pub fn pipe_sort_multiple(specs: &[SortSpec]) -> Document {
    let mut sort = Document::new();
    for s in specs {
        sort.insert(s.field.clone(), s.order.direction());
    }
    doc! { "$sort": sort }
}

#[must_use]
pub fn pipe_project(project: Document) -> Document {
    doc! { "$project": project }
}

/// `$switch` over compiled case conditions; branch order is kept.
///
/// # Errors
/// Propagates any `CompileError` from a case condition.
pub fn pipe_switch(params: &SwitchParams) -> Result<Document, CompileError> {
    let branches = params
        .cases
        .iter()
        .map(|c| Ok(Bson::Document(doc! { "case": build_filter(&c.case)?, "then": c.then.clone() })))
        .collect::<Result<Vec<Bson>, CompileError>>()?;
    Ok(doc! {
        "$switch": {
            "default": params.default.clone(),
            "branches": branches,
        }
    })
}

/// `$group` keyed by `id`; entries of `fields` are merged after `_id` and a
/// caller-supplied `_id` replaces the key.
pub fn pipe_group(id: impl Into<Bson>, fields: Document) -> Document {
    let mut group = doc! { "_id": id.into() };
    for (k, v) in fields {
        group.insert(k, v);
    }
    doc! { "$group": group }
}
