//! Filter compilation, value normalization and query sessions for
//! MongoDB-style document stores.
//!
//! A [`query::Filter`] tree compiles to a BSON query document; the
//! `pipe_*` builders in [`query`] produce aggregation stages; the
//! [`normalize`] module turns loosely typed records into BSON documents;
//! [`session::QuerySet`] and [`client::Session`] tie them to a store.

pub mod client;
pub mod config;
pub mod errors;
pub mod logger;
pub mod normalize;
pub mod query;
pub mod session;

pub use client::{Client, DocumentStore, Session};
pub use config::{AuthMechanism, ClientConfig};
pub use errors::{CompileError, DbError};
pub use normalize::{Normalized, normalize};
pub use query::{Filter, build_filter};
pub use session::{QueryParams, QuerySet};

/// Initializes logging from `log4rs.yaml` in the working directory.
///
/// # Errors
/// See [`logger::init`].
pub fn init() -> Result<(), DbError> {
    logger::init()
}
