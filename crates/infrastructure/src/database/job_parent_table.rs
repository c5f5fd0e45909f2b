use async_trait::async_trait;
use batch_domain::{BatchResult, Filter, JobParentColumn, JobParentRepository};

use super::executor::StatementExecutor;
use super::schema::JOBS_PARENTS_TABLE;
use super::table::RecordTable;

/// 作业依赖边表
#[derive(Debug, Clone)]
pub struct JobParentTable {
    table: RecordTable<JobParentColumn>,
}

impl JobParentTable {
    pub fn new(executor: StatementExecutor) -> Self {
        Self {
            table: RecordTable::new(executor, JOBS_PARENTS_TABLE),
        }
    }
}

#[async_trait]
impl JobParentRepository for JobParentTable {
    async fn exists(&self, batch_id: i64, job_id: i64, parent_id: i64) -> BatchResult<bool> {
        let filter = Filter::new()
            .eq(JobParentColumn::BatchId, batch_id)
            .eq(JobParentColumn::JobId, job_id)
            .eq(JobParentColumn::ParentId, parent_id);
        self.table.exists(&filter).await
    }

    async fn delete_where(&self, filter: &Filter<JobParentColumn>) -> BatchResult<u64> {
        self.table.delete(filter).await
    }
}
