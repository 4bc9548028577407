use bson::Document;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{CompileError, DbError};
use crate::normalize::{Normalized, normalize};
use crate::query::{Filter, Order, SortSpec, pipe_limit, pipe_match, pipe_skip, pipe_sort};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Plain settings for a [`QuerySet`]; zero or empty values mean "unset".
/// An unset timeout falls back to the client's configured timeout, or to
/// [`DEFAULT_TIMEOUT`] outside a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    pub table_name: String,
    #[serde(skip)]
    pub filter: Option<Filter>,
    #[serde(skip)]
    pub pipe: Option<Vec<Document>>,
    pub sort_field: String,
    pub sort_by: String,
    pub skip: i64,
    pub limit: i64,
    pub timeout_secs: u64,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            table_name: String::new(),
            filter: None,
            pipe: None,
            sort_field: String::new(),
            sort_by: String::new(),
            skip: 0,
            limit: 0,
            timeout_secs: 0,
        }
    }
}

/// Query state for one collection.
///
/// `build_pipeline` always emits, in order: the explicit pipe or a `$match`
/// of the filter, then `$skip`, `$limit` and `$sort` when set. Setter call
/// order does not matter.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySet {
    table: String,
    filter: Option<Filter>,
    pipe: Option<Vec<Document>>,
    sort: Option<SortSpec>,
    skip: Option<i64>,
    limit: Option<i64>,
    timeout: Duration,
}

impl Default for QuerySet {
    fn default() -> Self {
        Self {
            table: String::new(),
            filter: None,
            pipe: None,
            sort: None,
            skip: None,
            limit: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl QuerySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_params(params: QueryParams) -> Self {
        let mut set = Self::new();
        if !params.table_name.is_empty() {
            set = set.table(params.table_name);
        }
        if let Some(f) = params.filter {
            set = set.filter(f);
        }
        if let Some(p) = params.pipe {
            set = set.pipe(p);
        }
        if params.skip != 0 {
            set = set.skip(params.skip);
        }
        if params.limit != 0 {
            set = set.limit(params.limit);
        }
        if !params.sort_field.is_empty() {
            set = set.sort(params.sort_field, &params.sort_by);
        }
        if params.timeout_secs != 0 {
            set = set.timeout(Duration::from_secs(params.timeout_secs));
        }
        set
    }

    #[must_use]
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table = name.into();
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Explicit pipeline; when set the filter is ignored.
    #[must_use]
    pub fn pipe(mut self, pipe: Vec<Document>) -> Self {
        self.pipe = Some(pipe);
        self
    }

    #[must_use]
    pub const fn skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// `sort_by` of `"asc"` (any case) sorts ascending, anything else descending.
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, sort_by: &str) -> Self {
        self.sort = Some(SortSpec { field: field.into(), order: Order::from_label(sort_by) });
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Clears everything but the timeout.
    pub fn reset(&mut self) {
        *self = Self { timeout: self.timeout, ..Self::default() };
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub const fn timeout_duration(&self) -> Duration {
        self.timeout
    }

    /// Compiled filter for commands that take a plain filter document
    /// (update, delete). An unset filter matches everything.
    ///
    /// # Errors
    /// Propagates any `CompileError` from the filter.
    pub fn filter_document(&self) -> Result<Document, CompileError> {
        self.filter.as_ref().map_or_else(|| Ok(Document::new()), Filter::compile)
    }

    /// # Errors
    /// Propagates any `CompileError` from the filter.
    pub fn build_pipeline(&self) -> Result<Vec<Document>, CompileError> {
        let mut pipeline = match (&self.pipe, &self.filter) {
            (Some(pipe), _) => pipe.clone(),
            (None, Some(filter)) => vec![pipe_match(filter)?],
            (None, None) => vec![bson::doc! { "$match": {} }],
        };
        if let Some(skip) = self.skip {
            pipeline.push(pipe_skip(skip));
        }
        if let Some(limit) = self.limit {
            pipeline.push(pipe_limit(limit));
        }
        if let Some(sort) = &self.sort {
            pipeline.push(pipe_sort(&sort.field, sort.order == Order::Asc));
        }
        Ok(pipeline)
    }

    /// Normalizes `data` for a write.
    ///
    /// # Errors
    /// See [`normalize`].
    pub fn build_data<T: Serialize + ?Sized>(
        &self,
        data: &T,
        include_id: bool,
    ) -> Result<Normalized, DbError> {
        normalize(data, include_id)
    }
}
