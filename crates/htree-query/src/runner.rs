//! Row-limit enforcement over a raw [`QueryExecutor`] (§4.3).

use crate::executor::{ExecutorError, QueryExecutor, QueryOptions};
use crate::query::{Query, Row, RowLimit};
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunnerError {
    /// Distinguished error raised once the stream would yield more than
    /// `limit` rows; callers surface this as a `ResultSetTooLarge` info
    /// node rather than a fatal error (§4.9).
    #[error("result set exceeds row limit of {limit}")]
    RowsLimitExceeded { limit: usize },
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Wraps a [`QueryExecutor`], applying a per-call row limit and counting
/// rows as they stream past without ever pre-materializing them (§4.3).
pub struct QueryRunner<E> {
    executor: E,
}

impl<E: QueryExecutor> QueryRunner<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Run `query`, failing with [`RunnerError::RowsLimitExceeded`] as soon
    /// as the `limit + 1`-th row would be produced. `limit` of `None` means
    /// unbounded (the default per §4.3).
    pub async fn run(
        &self,
        query: Query,
        limit: RowLimit,
    ) -> Result<BoxStream<'static, Result<Row, RunnerError>>, RunnerError>
    where
        E: Clone + Send + Sync + 'static,
    {
        let opts = QueryOptions { limit };
        let mut inner = self.executor.create_query_reader(query, opts).await?;

        let limit_usize = limit.as_usize();
        let stream = try_stream! {
            let mut count: usize = 0;
            while let Some(row) = inner.next().await {
                let row = row?;
                count += 1;
                if let Some(limit) = limit_usize {
                    if count > limit {
                        Err(RunnerError::RowsLimitExceeded { limit })?;
                    }
                }
                yield row;
            }
        };

        Ok(Box::pin(stream))
    }
}
