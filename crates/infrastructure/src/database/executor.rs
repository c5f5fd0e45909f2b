use std::sync::Arc;

use batch_domain::{BatchResult, Record};
use sqlx::any::AnyQueryResult;
use sqlx::{Any, AnyPool, Row};
use tracing::debug;

use super::mapping::{row_to_record, Statement};
use super::retry::RetryPolicy;
use crate::error_handling::{RepositoryErrorHelpers, TableOperationContext};

/// Runs single statements against the pool through the retry policy.
///
/// Each call checks a connection out of the pool for the duration of one attempt only.
#[derive(Debug, Clone)]
pub struct StatementExecutor {
    pool: AnyPool,
    retry: Arc<RetryPolicy>,
}

impl StatementExecutor {
    pub fn new(pool: AnyPool, retry: Arc<RetryPolicy>) -> Self {
        Self { pool, retry }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn retry(&self) -> &Arc<RetryPolicy> {
        &self.retry
    }

    pub async fn execute(
        &self,
        statement: &Statement,
        context: &TableOperationContext,
    ) -> BatchResult<AnyQueryResult> {
        debug!(sql = %statement.sql, binds = statement.binds.len(), "执行语句");
        let pool = &self.pool;
        let result = self
            .retry
            .run(&context.label(), move || statement.query().execute(pool))
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;
        RepositoryErrorHelpers::log_operation_success(context, result.rows_affected());
        Ok(result)
    }

    /// Execute an `INSERT` and return the generated autoincrement id.
    ///
    /// The SQLite `Any` driver never reports `last_insert_id`, so the id is read back with
    /// `last_insert_rowid()` on the connection that ran the insert.
    pub async fn execute_insert(
        &self,
        statement: &Statement,
        context: &TableOperationContext,
    ) -> BatchResult<i64> {
        debug!(sql = %statement.sql, binds = statement.binds.len(), "执行插入");
        let pool = &self.pool;
        let id = self
            .retry
            .run(&context.label(), move || async move {
                let mut conn = pool.acquire().await?;
                let result = statement.query().execute(&mut *conn).await?;
                match result.last_insert_id() {
                    Some(id) => Ok(id),
                    None => {
                        sqlx::query_scalar::<Any, i64>("SELECT last_insert_rowid()")
                            .fetch_one(&mut *conn)
                            .await
                    }
                }
            })
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;
        RepositoryErrorHelpers::log_operation_success(context, 1);
        Ok(id)
    }

    pub async fn fetch_records(
        &self,
        statement: &Statement,
        context: &TableOperationContext,
    ) -> BatchResult<Vec<Record>> {
        debug!(sql = %statement.sql, binds = statement.binds.len(), "执行查询");
        let pool = &self.pool;
        let rows = self
            .retry
            .run(&context.label(), move || statement.query().fetch_all(pool))
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;

        let records = rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;
        RepositoryErrorHelpers::log_operation_success(context, records.len() as u64);
        Ok(records)
    }

    /// The first column of the single result row as an integer.
    pub async fn fetch_count(
        &self,
        statement: &Statement,
        context: &TableOperationContext,
    ) -> BatchResult<i64> {
        debug!(sql = %statement.sql, binds = statement.binds.len(), "执行计数查询");
        let pool = &self.pool;
        self.retry
            .run(&context.label(), move || async move {
                let row = statement.query().fetch_one(pool).await?;
                row.try_get::<i64, _>(0)
            })
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context, e))
    }
}
