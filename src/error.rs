//! Pipeline error taxonomy.
//!
//! Every failure a request can hit is one of these variants. The dispatcher
//! in [`crate::pipeline`] catches them at the component boundary and turns
//! each into a user-displayable string — no variant ever escapes to the
//! front end as a raw error.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the routing and answer-generation pipeline.
#[derive(Error, Debug)]
pub enum AssistError {
    /// The encoder, completion service, or a backing store is unreachable.
    #[error("backend service unavailable: {0}")]
    Infrastructure(String),

    /// The FAQ collection has not been ingested yet.
    #[error("FAQ collection '{0}' does not exist — run `storebot ingest` first")]
    FaqIndexMissing(String),

    /// The completion output contained no `<SQL>` block. A normal outcome,
    /// not an exceptional one.
    #[error("completion output did not contain a SQL block")]
    QueryNotFound,

    /// The generated query failed the read-only safety gate and was never
    /// sent to the store.
    #[error("unsafe query rejected: {0}")]
    Rejected(String),

    /// The store rejected a query that passed validation.
    #[error("query execution failed: {cause}")]
    Execution { sql: String, cause: String },

    /// Neither the product database nor the bulk CSV fallback exists.
    #[error(
        "product database not found: expected {db} (or the bulk CSV {csv} to build it from)"
    )]
    DataSourceMissing { db: PathBuf, csv: PathBuf },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AssistError {
    fn from(e: sqlx::Error) -> Self {
        AssistError::Infrastructure(e.to_string())
    }
}
