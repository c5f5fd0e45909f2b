//! 作业图构建器
//!
//! Collects the jobs and dependency edges of one batch in memory and writes them with
//! multi-row inserts inside a single transaction. A backend that stores fewer rows than were
//! sent (e.g. rows dropped by a trigger or `INSERT IGNORE` semantics) is reported as `false`
//! and the transaction is rolled back.

use batch_domain::{BatchError, BatchResult, JobParent, NewJob};
use metrics::counter;
use sqlx::AnyPool;
use tracing::{debug, info, instrument};

use super::executor::StatementExecutor;
use super::mapping::{bulk_insert_statements, Statement};
use super::schema::{JOBS_PARENTS_TABLE, JOBS_TABLE};
use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};
use crate::table_context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphInsertOutcome {
    Committed,
    Mismatch {
        table: &'static str,
        inserted: u64,
        expected: u64,
    },
}

/// Builder for the jobs and edges of one batch.
///
/// `commit` and `close` consume the builder, so nothing can be added afterwards.
#[derive(Debug)]
pub struct JobsBuilder {
    executor: StatementExecutor,
    batch_id: i64,
    max_rows_per_statement: usize,
    jobs: Vec<NewJob>,
    edges: Vec<JobParent>,
}

impl JobsBuilder {
    pub fn new(executor: StatementExecutor, batch_id: i64, max_rows_per_statement: usize) -> Self {
        Self {
            executor,
            batch_id,
            max_rows_per_statement,
            jobs: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn batch_id(&self) -> i64 {
        self.batch_id
    }

    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    pub fn pending_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn add_job(&mut self, job: NewJob) -> BatchResult<()> {
        if job.batch_id != self.batch_id {
            return Err(BatchError::invalid_argument(format!(
                "作业 {} 属于批次 {}，不能加入批次 {} 的构建器",
                job.job_id, job.batch_id, self.batch_id
            )));
        }
        self.jobs.push(job);
        Ok(())
    }

    pub fn add_edge(&mut self, edge: JobParent) -> BatchResult<()> {
        if edge.batch_id != self.batch_id {
            return Err(BatchError::invalid_argument(format!(
                "依赖边 {} -> {} 属于批次 {}，不能加入批次 {} 的构建器",
                edge.parent_id, edge.job_id, edge.batch_id, self.batch_id
            )));
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Discard everything pending.
    pub fn close(self) {
        debug!(
            batch_id = self.batch_id,
            jobs = self.jobs.len(),
            edges = self.edges.len(),
            "作业图构建器已关闭"
        );
    }

    /// Insert all pending jobs, then all pending edges.
    ///
    /// Returns `Ok(false)` when either phase stored a different number of rows than it sent;
    /// nothing is kept in that case. Backend errors are returned as `Err`.
    #[instrument(skip(self), fields(batch_id = self.batch_id, jobs = self.jobs.len(), edges = self.edges.len()))]
    pub async fn commit(self) -> BatchResult<bool> {
        if self.jobs.is_empty() && self.edges.is_empty() {
            debug!("没有待提交的作业或依赖边");
            return Ok(true);
        }

        let job_statements =
            bulk_insert_statements(JOBS_TABLE, &self.jobs, self.max_rows_per_statement)?;
        let edge_statements =
            bulk_insert_statements(JOBS_PARENTS_TABLE, &self.edges, self.max_rows_per_statement)?;

        let context =
            table_context!(RepositoryOperation::BulkInsert, JOBS_TABLE, batch_id = self.batch_id)
                .with_additional_info(format!(
                    "jobs={}, edges={}",
                    self.jobs.len(),
                    self.edges.len()
                ));
        let pool = self.executor.pool();
        let (jobs, edges) = (&job_statements, &edge_statements);

        let outcome = self
            .executor
            .retry()
            .run(&context.label(), move || insert_graph(pool, jobs, edges))
            .await
            .map_err(|e| {
                counter!("batch_db_job_graph_commits_total", "outcome" => "error").increment(1);
                RepositoryErrorHelpers::database_error(&context, e)
            })?;

        match outcome {
            GraphInsertOutcome::Committed => {
                counter!("batch_db_job_graph_commits_total", "outcome" => "committed")
                    .increment(1);
                info!(
                    batch_id = self.batch_id,
                    jobs = self.jobs.len(),
                    edges = self.edges.len(),
                    "作业图已提交"
                );
                Ok(true)
            }
            GraphInsertOutcome::Mismatch {
                table,
                inserted,
                expected,
            } => {
                counter!("batch_db_job_graph_commits_total", "outcome" => "mismatch")
                    .increment(1);
                info!(
                    batch_id = self.batch_id,
                    table = table,
                    inserted = inserted,
                    expected = expected,
                    "插入行数与预期不符，作业图已回滚"
                );
                Ok(false)
            }
        }
    }
}

async fn insert_graph(
    pool: &AnyPool,
    jobs: &[(Statement, u64)],
    edges: &[(Statement, u64)],
) -> Result<GraphInsertOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    for (table, statements) in [(JOBS_TABLE, jobs), (JOBS_PARENTS_TABLE, edges)] {
        let expected: u64 = statements.iter().map(|(_, rows)| rows).sum();
        let mut inserted = 0;

        for (statement, rows) in statements {
            let affected = statement.query().execute(&mut *tx).await?.rows_affected();
            inserted += affected;
            if affected != *rows {
                tx.rollback().await?;
                return Ok(GraphInsertOutcome::Mismatch {
                    table,
                    inserted,
                    expected,
                });
            }
        }
    }

    tx.commit().await?;
    Ok(GraphInsertOutcome::Committed)
}
