//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则

use async_trait::async_trait;
use batch_core::BatchResult;

use crate::columns::{BatchColumn, JobColumn, JobField, JobParentColumn};
use crate::entities::{Batch, JobKey, JobView, NewBatch, Stage, StageOutcome};
use crate::query::{Assignments, Filter, Record};

/// 批次仓储抽象
#[async_trait]
pub trait BatchRepository: Send + Sync {
    /// Returns the autoincrement id of the new batch.
    async fn create(&self, batch: &NewBatch) -> BatchResult<i64>;
    async fn get(&self, ids: &[i64]) -> BatchResult<Vec<Batch>>;
    /// Projected read; an empty `fields` slice is rejected.
    async fn get_fields(&self, ids: &[i64], fields: &[BatchColumn]) -> BatchResult<Vec<Record>>;
    async fn get_where(&self, filter: &Filter<BatchColumn>) -> BatchResult<Vec<Batch>>;
    async fn get_all(&self) -> BatchResult<Vec<Batch>>;
    async fn exists(&self, id: i64) -> BatchResult<bool>;
    async fn delete(&self, id: i64) -> BatchResult<()>;
    /// Compare-and-set: applies `set` only where `id` matches and `compare` holds.
    async fn update(
        &self,
        id: i64,
        compare: &Filter<BatchColumn>,
        set: &Assignments<BatchColumn>,
    ) -> BatchResult<u64>;
    async fn get_finished_deleted(&self) -> BatchResult<Vec<Batch>>;
    async fn get_undeleted(&self, ids: &[i64], user: &str) -> BatchResult<Vec<Batch>>;
}

/// 作业仓储抽象
///
/// Every read joins the owning batch, so results carry `cancelled`, `user` and `userdata`.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn update(
        &self,
        batch_id: i64,
        job_id: i64,
        compare: &Filter<JobColumn>,
        set: &Assignments<JobColumn>,
    ) -> BatchResult<u64>;
    async fn get(&self, batch_id: i64, ids: &[i64]) -> BatchResult<Vec<JobView>>;
    async fn get_fields(
        &self,
        batch_id: i64,
        ids: &[i64],
        fields: &[JobField],
    ) -> BatchResult<Vec<Record>>;
    async fn get_where(&self, filter: &Filter<JobColumn>) -> BatchResult<Vec<JobView>>;
    async fn get_by_batch(&self, batch_id: i64) -> BatchResult<Vec<JobView>>;
    async fn get_all(&self) -> BatchResult<Vec<JobView>>;
    async fn get_undeleted(
        &self,
        batch_id: i64,
        ids: &[i64],
        user: &str,
    ) -> BatchResult<Vec<JobView>>;
    async fn exists(&self, batch_id: i64, job_id: i64) -> BatchResult<bool>;
    async fn delete(&self, batch_id: i64, job_id: i64) -> BatchResult<()>;
    async fn get_incomplete_parents(&self, batch_id: i64, job_id: i64)
        -> BatchResult<Vec<JobKey>>;
    async fn get_parents(&self, batch_id: i64, job_id: i64) -> BatchResult<Vec<JobView>>;
    async fn get_children(&self, batch_id: i64, parent_id: i64) -> BatchResult<Vec<JobView>>;
    async fn update_with_log_and_exit_code(
        &self,
        batch_id: i64,
        job_id: i64,
        stage: Stage,
        outcome: &StageOutcome,
        compare: &Filter<JobColumn>,
        extra: &Assignments<JobColumn>,
    ) -> BatchResult<u64>;
    async fn get_log_uri(&self, batch_id: i64, job_id: i64, stage: Stage)
        -> BatchResult<Option<String>>;
    async fn get_pod_status(
        &self,
        batch_id: i64,
        job_id: i64,
        stage: Stage,
    ) -> BatchResult<Option<String>>;
}

/// 作业依赖边仓储抽象
#[async_trait]
pub trait JobParentRepository: Send + Sync {
    async fn exists(&self, batch_id: i64, job_id: i64, parent_id: i64) -> BatchResult<bool>;
    async fn delete_where(&self, filter: &Filter<JobParentColumn>) -> BatchResult<u64>;
}
