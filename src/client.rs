//! Command dispatch over a [`DocumentStore`].
//!
//! ```rust,ignore
//! let client = Client::new(ClientConfig::default(), store);
//! let rows = client
//!     .collection("users")
//!     .filter(Filter::gt("age", 30))
//!     .limit(10)
//!     .find()
//!     .await?;
//! ```

use bson::Document;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::errors::DbError;
use crate::logger::AUDIT_TARGET;
use crate::normalize::Normalized;
use crate::query::{DeleteReport, Filter, UpdateReport, pipe_limit};
use crate::session::{QueryParams, QuerySet};

/// The driver capability this crate runs on top of. Implementations own the
/// connection; callers bound each call with a deadline.
pub trait DocumentStore: Send + Sync {
    fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> impl Future<Output = Result<Vec<Document>, DbError>> + Send;

    /// Returns the number of inserted documents.
    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> impl Future<Output = Result<u64, DbError>> + Send;

    fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> impl Future<Output = Result<UpdateReport, DbError>> + Send;

    fn delete_many(
        &self,
        collection: &str,
        filter: Document,
    ) -> impl Future<Output = Result<DeleteReport, DbError>> + Send;
}

/// Holds the immutable configuration and the store; hands out sessions.
pub struct Client<S> {
    config: Arc<ClientConfig>,
    store: Arc<S>,
}

impl<S> Clone for Client<S> {
    fn clone(&self) -> Self {
        Self { config: Arc::clone(&self.config), store: Arc::clone(&self.store) }
    }
}

impl<S: DocumentStore> Client<S> {
    pub fn new(config: ClientConfig, store: S) -> Self {
        log::info!("client configured for {}:{}", config.host, config.port);
        Self { config: Arc::new(config), store: Arc::new(store) }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.config.database
    }

    /// A session configured from `params`. A zero timeout falls back to the
    /// client's configured timeout.
    #[must_use]
    pub fn query(&self, params: QueryParams) -> Session<S> {
        let use_config_timeout = params.timeout_secs == 0;
        let mut set = QuerySet::from_params(params);
        if use_config_timeout {
            set = set.timeout(self.config.timeout());
        }
        Session { store: Arc::clone(&self.store), set }
    }

    #[must_use]
    pub fn collection(&self, name: &str) -> Session<S> {
        Session {
            store: Arc::clone(&self.store),
            set: QuerySet::new().table(name).timeout(self.config.timeout()),
        }
    }
}

/// A [`QuerySet`] bound to a store.
pub struct Session<S> {
    store: Arc<S>,
    set: QuerySet,
}

impl<S: DocumentStore> Session<S> {
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.set = self.set.filter(filter);
        self
    }

    #[must_use]
    pub fn pipe(mut self, pipe: Vec<Document>) -> Self {
        self.set = self.set.pipe(pipe);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: i64) -> Self {
        self.set = self.set.skip(skip);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.set = self.set.limit(limit);
        self
    }

    #[must_use]
    pub fn sort(mut self, field: &str, sort_by: &str) -> Self {
        self.set = self.set.sort(field, sort_by);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.set = self.set.timeout(timeout);
        self
    }

    #[must_use]
    pub const fn query_set(&self) -> &QuerySet {
        &self.set
    }

    /// # Errors
    /// Returns `DbError::Compile` for a malformed filter, `DbError::Timeout`
    /// when the store misses the deadline, or the store's own error.
    pub async fn find(&self) -> Result<Vec<Document>, DbError> {
        let pipeline = self.set.build_pipeline()?;
        let table = self.collection_name()?;
        log::info!(target: AUDIT_TARGET, "find on {table}: {} stages", pipeline.len());
        self.with_deadline(table, self.store.aggregate(table, pipeline)).await
    }

    /// First document of [`Session::find`], with the limit forced to one.
    ///
    /// # Errors
    /// Same as [`Session::find`].
    pub async fn find_one(&self) -> Result<Option<Document>, DbError> {
        let mut pipeline = self.set.build_pipeline()?;
        pipeline.push(pipe_limit(1));
        let table = self.collection_name()?;
        log::info!(target: AUDIT_TARGET, "find_one on {table}");
        let docs = self.with_deadline(table, self.store.aggregate(table, pipeline)).await?;
        Ok(docs.into_iter().next())
    }

    /// Inserts a record, map or sequence of records. Identifier fields are
    /// dropped so the server assigns them.
    ///
    /// # Errors
    /// Returns a normalization error, `DbError::Timeout`, or the store's error.
    pub async fn insert<T: Serialize + ?Sized>(&self, data: &T) -> Result<u64, DbError> {
        let documents = self.set.build_data(data, false)?.into_documents()?;
        let table = self.collection_name()?;
        log::info!(target: AUDIT_TARGET, "insert on {table}: {} documents", documents.len());
        self.with_deadline(table, self.store.insert_many(table, documents)).await
    }

    /// Inserts each record of `items`; an empty slice is `DbError::EmptyDocument`.
    ///
    /// # Errors
    /// As [`Session::insert`].
    pub async fn insert_many<T: Serialize>(&self, items: &[T]) -> Result<u64, DbError> {
        self.insert(items).await
    }

    /// `$set`s the normalized fields of `data` on every matching document.
    ///
    /// # Errors
    /// Returns `DbError::InvalidInput` when `data` is a sequence, otherwise as
    /// [`Session::insert`].
    pub async fn update<T: Serialize + ?Sized>(&self, data: &T) -> Result<UpdateReport, DbError> {
        let fields = match self.set.build_data(data, false)? {
            Normalized::Document(d) => d,
            Normalized::Sequence(_) => {
                return Err(DbError::InvalidInput("update data must be a single record".into()));
            }
        };
        let filter = self.set.filter_document()?;
        let table = self.collection_name()?;
        log::info!(target: AUDIT_TARGET, "update on {table}: {} fields", fields.len());
        let update = bson::doc! { "$set": fields };
        self.with_deadline(table, self.store.update_many(table, filter, update)).await
    }

    /// # Errors
    /// Returns `DbError::Compile`, `DbError::Timeout`, or the store's error.
    pub async fn delete(&self) -> Result<DeleteReport, DbError> {
        let filter = self.set.filter_document()?;
        let table = self.collection_name()?;
        log::info!(target: AUDIT_TARGET, "delete on {table}");
        self.with_deadline(table, self.store.delete_many(table, filter)).await
    }

    fn collection_name(&self) -> Result<&str, DbError> {
        match self.set.table_name() {
            "" => Err(DbError::QueryError("no collection selected".into())),
            name => Ok(name),
        }
    }

    async fn with_deadline<T>(
        &self,
        table: &str,
        fut: impl Future<Output = Result<T, DbError>>,
    ) -> Result<T, DbError> {
        let limit = self.set.timeout_duration();
        if let Ok(res) = tokio::time::timeout(limit, fut).await {
            res
        } else {
            log::warn!("command on {table} exceeded {} ms", limit.as_millis());
            Err(DbError::Timeout {
                collection: table.to_string(),
                after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            })
        }
    }
}
