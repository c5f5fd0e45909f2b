use async_trait::async_trait;
use batch_domain::{
    Assignments, Batch, BatchColumn, BatchRepository, BatchResult, Column, Filter, NewBatch,
    Record,
};
use tracing::{debug, instrument};

use super::executor::StatementExecutor;
use super::mapping::MappingHelpers;
use super::predicate::{build_predicate, qualified};
use super::schema::BATCH_TABLE;
use super::table::RecordTable;
use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation};
use crate::table_context;

/// 批次表
#[derive(Debug, Clone)]
pub struct BatchTable {
    table: RecordTable<BatchColumn>,
}

impl BatchTable {
    pub fn new(executor: StatementExecutor) -> Self {
        Self {
            table: RecordTable::new(executor, BATCH_TABLE).with_autoincrement(),
        }
    }

    fn to_batches(records: Vec<Record>) -> BatchResult<Vec<Batch>> {
        records
            .iter()
            .map(MappingHelpers::record_to_batch)
            .collect::<BatchResult<Vec<_>>>()
            .map_err(|e| {
                RepositoryErrorHelpers::integrity_error(
                    &table_context!(RepositoryOperation::Read, BATCH_TABLE),
                    e,
                )
            })
    }
}

#[async_trait]
impl BatchRepository for BatchTable {
    #[instrument(skip(self, batch), fields(user = %batch.user, n_jobs = batch.n_jobs))]
    async fn create(&self, batch: &NewBatch) -> BatchResult<i64> {
        let fields = Assignments::new()
            .set(BatchColumn::User, batch.user.as_str())
            .set(BatchColumn::Userdata, batch.userdata.clone())
            .set(BatchColumn::State, batch.state.as_str())
            .set(
                BatchColumn::Attributes,
                MappingHelpers::json_column(batch.attributes.as_ref())?,
            )
            .set(BatchColumn::Callback, batch.callback.clone())
            .set(BatchColumn::NJobs, batch.n_jobs);

        let id = self.table.create(&fields).await?;
        debug!(batch_id = id, "批次已创建");
        Ok(id)
    }

    async fn get(&self, ids: &[i64]) -> BatchResult<Vec<Batch>> {
        let filter = Filter::new().any_of(BatchColumn::Id, ids.iter().copied());
        Self::to_batches(self.table.get(&filter, None).await?)
    }

    async fn get_fields(&self, ids: &[i64], fields: &[BatchColumn]) -> BatchResult<Vec<Record>> {
        let filter = Filter::new().any_of(BatchColumn::Id, ids.iter().copied());
        self.table.get(&filter, Some(fields)).await
    }

    async fn get_where(&self, filter: &Filter<BatchColumn>) -> BatchResult<Vec<Batch>> {
        Self::to_batches(self.table.get(filter, None).await?)
    }

    async fn get_all(&self) -> BatchResult<Vec<Batch>> {
        Self::to_batches(self.table.get_all().await?)
    }

    async fn exists(&self, id: i64) -> BatchResult<bool> {
        self.table
            .exists(&Filter::new().eq(BatchColumn::Id, id))
            .await
    }

    async fn delete(&self, id: i64) -> BatchResult<()> {
        self.table
            .delete(&Filter::new().eq(BatchColumn::Id, id))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, compare, set), fields(conditions = compare.len(), assignments = set.len()))]
    async fn update(
        &self,
        id: i64,
        compare: &Filter<BatchColumn>,
        set: &Assignments<BatchColumn>,
    ) -> BatchResult<u64> {
        let filter = Filter::new().eq(BatchColumn::Id, id).and(compare.clone());
        let context = table_context!(RepositoryOperation::Update, BATCH_TABLE, batch_id = id);
        self.table
            .update_where(build_predicate(&filter, None), set, context)
            .await
    }

    /// Soft-deleted batches whose jobs have all completed.
    async fn get_finished_deleted(&self) -> BatchResult<Vec<Batch>> {
        let mut predicate = build_predicate(&Filter::new().eq(BatchColumn::Deleted, true), None);
        predicate.push(
            format!(
                "{} = {}",
                qualified(None, BatchColumn::NCompleted.name()),
                qualified(None, BatchColumn::NJobs.name())
            ),
            [],
        );
        Self::to_batches(self.table.get_where(predicate, None).await?)
    }

    async fn get_undeleted(&self, ids: &[i64], user: &str) -> BatchResult<Vec<Batch>> {
        let filter = Filter::new()
            .any_of(BatchColumn::Id, ids.iter().copied())
            .eq(BatchColumn::User, user)
            .eq(BatchColumn::Deleted, false);
        Self::to_batches(self.table.get(&filter, None).await?)
    }
}
