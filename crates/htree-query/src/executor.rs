//! The query executor capability consumed by the hierarchy engine (§6).

use crate::query::{Query, Row, RowLimit};
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("query execution failed: {0}")]
    Failed(String),
}

/// Options accompanying a query read (§6: `opts: { rowFormat, limit }`).
///
/// Row format is always the named-row shape modeled by [`Row`]; the only
/// variable option is the limit, which the executor enforces as a hard cap
/// on how many rows it will ever produce (an executor is free to stop
/// early once the limit is reached, independent of [`crate::runner::QueryRunner`]'s
/// own accounting).
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    pub limit: RowLimit,
}

/// Executes ECSQL-shaped queries against the underlying data source and
/// streams back rows (§6 "Query executor").
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Open a row stream for `query`. The returned stream must respect
    /// back-pressure: rows are produced only as fast as the consumer polls
    /// (§5 "Back-pressure").
    async fn create_query_reader(
        &self,
        query: Query,
        opts: QueryOptions,
    ) -> Result<BoxStream<'static, Result<Row, ExecutorError>>, ExecutorError>;
}

#[async_trait]
impl QueryExecutor for std::sync::Arc<dyn QueryExecutor> {
    async fn create_query_reader(
        &self,
        query: Query,
        opts: QueryOptions,
    ) -> Result<BoxStream<'static, Result<Row, ExecutorError>>, ExecutorError> {
        self.as_ref().create_query_reader(query, opts).await
    }
}
