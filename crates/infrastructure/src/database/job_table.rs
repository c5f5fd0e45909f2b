//! 作业表
//!
//! Every read joins `jobs` with the owning `batch` row so that the batch-level `cancelled`,
//! `user` and `userdata` fields travel with each job.

use async_trait::async_trait;
use batch_domain::{
    Assignments, BatchColumn, BatchError, BatchResult, BatchViewField, Column, Filter, JobColumn,
    JobField, JobKey, JobParentColumn, JobRepository, JobState, JobView, Record, Stage,
    StageOutcome,
};
use tracing::instrument;

use super::executor::StatementExecutor;
use super::mapping::{MappingHelpers, Statement};
use super::predicate::{build_predicate, qualified, quote_identifier, Predicate};
use super::schema::{BATCH_TABLE, JOBS_PARENTS_TABLE, JOBS_TABLE};
use super::table::RecordTable;
use crate::error_handling::{RepositoryErrorHelpers, RepositoryOperation, TableOperationContext};
use crate::table_context;

/// Which side of an edge the job being looked up sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeDirection {
    /// Jobs the given job depends on.
    Parents,
    /// Jobs that depend on the given job.
    Children,
}

#[derive(Debug, Clone)]
pub struct JobTable {
    table: RecordTable<JobColumn>,
}

impl JobTable {
    pub fn new(executor: StatementExecutor) -> Self {
        Self {
            table: RecordTable::new(executor, JOBS_TABLE),
        }
    }

    fn executor(&self) -> &StatementExecutor {
        self.table.executor()
    }

    fn select_list(fields: Option<&[JobField]>) -> BatchResult<String> {
        match fields {
            None => {
                let mut columns = vec![format!("{}.*", quote_identifier(JOBS_TABLE))];
                columns.extend(
                    BatchViewField::ALL
                        .iter()
                        .map(|f| qualified(Some(BATCH_TABLE), f.batch_column().name())),
                );
                Ok(columns.join(", "))
            }
            Some([]) => Err(BatchError::invalid_argument("查询作业时投影列不能为空")),
            Some(fields) => Ok(fields
                .iter()
                .map(|field| match field {
                    JobField::Job(column) => qualified(Some(JOBS_TABLE), column.name()),
                    JobField::BatchView(view) => {
                        qualified(Some(BATCH_TABLE), view.batch_column().name())
                    }
                })
                .collect::<Vec<_>>()
                .join(", ")),
        }
    }

    fn batch_join() -> String {
        format!(
            "INNER JOIN {batch} ON {} = {}",
            qualified(Some(JOBS_TABLE), JobColumn::BatchId.name()),
            qualified(Some(BATCH_TABLE), BatchColumn::Id.name()),
            batch = quote_identifier(BATCH_TABLE),
        )
    }

    /// `jobs` joined with `jobs-parents` on the parent or child end of each edge.
    fn edge_join(direction: EdgeDirection) -> String {
        let edge_end = match direction {
            EdgeDirection::Parents => JobParentColumn::ParentId,
            EdgeDirection::Children => JobParentColumn::JobId,
        };
        format!(
            "INNER JOIN {edges} ON {} = {} AND {} = {}",
            qualified(Some(JOBS_TABLE), JobColumn::BatchId.name()),
            qualified(Some(JOBS_PARENTS_TABLE), JobParentColumn::BatchId.name()),
            qualified(Some(JOBS_TABLE), JobColumn::JobId.name()),
            qualified(Some(JOBS_PARENTS_TABLE), edge_end.name()),
            edges = quote_identifier(JOBS_PARENTS_TABLE),
        )
    }

    async fn select(
        &self,
        fields: Option<&[JobField]>,
        joins: &[String],
        predicate: Predicate,
        context: TableOperationContext,
    ) -> BatchResult<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM {} {} WHERE {}",
            Self::select_list(fields)?,
            quote_identifier(JOBS_TABLE),
            joins.join(" "),
            predicate.sql()
        );
        self.executor()
            .fetch_records(&Statement::new(sql, predicate.into_binds()), &context)
            .await
    }

    async fn select_views(
        &self,
        joins: &[String],
        predicate: Predicate,
        context: TableOperationContext,
    ) -> BatchResult<Vec<JobView>> {
        let records = self.select(None, joins, predicate, context.clone()).await?;
        records
            .iter()
            .map(MappingHelpers::record_to_job_view)
            .collect::<BatchResult<Vec<_>>>()
            .map_err(|e| RepositoryErrorHelpers::integrity_error(&context, e))
    }

    fn key_filter(batch_id: i64, job_id: i64) -> Filter<JobColumn> {
        Filter::new()
            .eq(JobColumn::BatchId, batch_id)
            .eq(JobColumn::JobId, job_id)
    }

    /// A single nullable text column of one job; more than one matching row is an error.
    async fn get_stage_text(
        &self,
        batch_id: i64,
        job_id: i64,
        column: JobColumn,
    ) -> BatchResult<Option<String>> {
        let context = table_context!(RepositoryOperation::Read, JOBS_TABLE, batch_id = batch_id, job_id = job_id);
        let records = self
            .select(
                Some(&[JobField::Job(column)]),
                &[Self::batch_join()],
                build_predicate(&Self::key_filter(batch_id, job_id), Some(JOBS_TABLE)),
                context.clone(),
            )
            .await?;

        match records.as_slice() {
            [] => Ok(None),
            [record] => record
                .opt_string(column.name())
                .map_err(|e| RepositoryErrorHelpers::integrity_error(&context, e)),
            _ => Err(RepositoryErrorHelpers::integrity_error(
                &context,
                BatchError::integrity(format!("作业键匹配到 {} 行", records.len())),
            )),
        }
    }

    async fn edge_views(
        &self,
        batch_id: i64,
        job_id: i64,
        direction: EdgeDirection,
    ) -> BatchResult<Vec<JobView>> {
        // the looked-up job sits on the opposite end of the edge from the joined rows
        let anchor = match direction {
            EdgeDirection::Parents => JobParentColumn::JobId,
            EdgeDirection::Children => JobParentColumn::ParentId,
        };
        let filter = Filter::new()
            .eq(JobParentColumn::BatchId, batch_id)
            .eq(anchor, job_id);
        self.select_views(
            &[Self::batch_join(), Self::edge_join(direction)],
            build_predicate(&filter, Some(JOBS_PARENTS_TABLE)),
            table_context!(RepositoryOperation::Read, JOBS_TABLE, batch_id = batch_id, job_id = job_id),
        )
        .await
    }
}

#[async_trait]
impl JobRepository for JobTable {
    /// Batch-view fields are not [`JobColumn`]s, so they can never be assigned here.
    #[instrument(skip(self, compare, set), fields(conditions = compare.len(), assignments = set.len()))]
    async fn update(
        &self,
        batch_id: i64,
        job_id: i64,
        compare: &Filter<JobColumn>,
        set: &Assignments<JobColumn>,
    ) -> BatchResult<u64> {
        let filter = Self::key_filter(batch_id, job_id).and(compare.clone());
        let context = table_context!(RepositoryOperation::Update, JOBS_TABLE, batch_id = batch_id, job_id = job_id);
        self.table
            .update_where(build_predicate(&filter, None), set, context)
            .await
    }

    async fn get(&self, batch_id: i64, ids: &[i64]) -> BatchResult<Vec<JobView>> {
        let filter = Filter::new()
            .eq(JobColumn::BatchId, batch_id)
            .any_of(JobColumn::JobId, ids.iter().copied());
        self.get_where(&filter).await
    }

    async fn get_fields(
        &self,
        batch_id: i64,
        ids: &[i64],
        fields: &[JobField],
    ) -> BatchResult<Vec<Record>> {
        let filter = Filter::new()
            .eq(JobColumn::BatchId, batch_id)
            .any_of(JobColumn::JobId, ids.iter().copied());
        self.select(
            Some(fields),
            &[Self::batch_join()],
            build_predicate(&filter, Some(JOBS_TABLE)),
            table_context!(RepositoryOperation::Read, JOBS_TABLE, batch_id = batch_id),
        )
        .await
    }

    async fn get_where(&self, filter: &Filter<JobColumn>) -> BatchResult<Vec<JobView>> {
        self.select_views(
            &[Self::batch_join()],
            build_predicate(filter, Some(JOBS_TABLE)),
            table_context!(RepositoryOperation::Read, JOBS_TABLE),
        )
        .await
    }

    async fn get_by_batch(&self, batch_id: i64) -> BatchResult<Vec<JobView>> {
        self.get_where(&Filter::new().eq(JobColumn::BatchId, batch_id))
            .await
    }

    async fn get_all(&self) -> BatchResult<Vec<JobView>> {
        self.get_where(&Filter::new()).await
    }

    async fn get_undeleted(
        &self,
        batch_id: i64,
        ids: &[i64],
        user: &str,
    ) -> BatchResult<Vec<JobView>> {
        let jobs = Filter::new()
            .eq(JobColumn::BatchId, batch_id)
            .any_of(JobColumn::JobId, ids.iter().copied());
        let batch = Filter::new()
            .eq(BatchColumn::User, user)
            .eq(BatchColumn::Deleted, false);
        self.select_views(
            &[Self::batch_join()],
            build_predicate(&jobs, Some(JOBS_TABLE)).and(build_predicate(&batch, Some(BATCH_TABLE))),
            table_context!(RepositoryOperation::Read, JOBS_TABLE, batch_id = batch_id),
        )
        .await
    }

    async fn exists(&self, batch_id: i64, job_id: i64) -> BatchResult<bool> {
        self.table.exists(&Self::key_filter(batch_id, job_id)).await
    }

    async fn delete(&self, batch_id: i64, job_id: i64) -> BatchResult<()> {
        self.table.delete(&Self::key_filter(batch_id, job_id)).await?;
        Ok(())
    }

    /// Parents of `(batch_id, job_id)` still in `Pending`, `Ready` or `Running`.
    #[instrument(skip(self))]
    async fn get_incomplete_parents(
        &self,
        batch_id: i64,
        job_id: i64,
    ) -> BatchResult<Vec<JobKey>> {
        let parents = Filter::new().any_of(JobColumn::State, JobState::INCOMPLETE);
        let edge = Filter::new()
            .eq(JobParentColumn::BatchId, batch_id)
            .eq(JobParentColumn::JobId, job_id);
        let context = table_context!(RepositoryOperation::Read, JOBS_TABLE, batch_id = batch_id, job_id = job_id);

        let records = self
            .select(
                Some(&[
                    JobField::Job(JobColumn::BatchId),
                    JobField::Job(JobColumn::JobId),
                ]),
                &[Self::edge_join(EdgeDirection::Parents)],
                build_predicate(&parents, Some(JOBS_TABLE))
                    .and(build_predicate(&edge, Some(JOBS_PARENTS_TABLE))),
                context.clone(),
            )
            .await?;

        records
            .iter()
            .map(|record| {
                Ok(JobKey {
                    batch_id: record.i64(JobColumn::BatchId.name())?,
                    job_id: record.i64(JobColumn::JobId.name())?,
                })
            })
            .collect::<BatchResult<Vec<_>>>()
            .map_err(|e| RepositoryErrorHelpers::integrity_error(&context, e))
    }

    async fn get_parents(&self, batch_id: i64, job_id: i64) -> BatchResult<Vec<JobView>> {
        self.edge_views(batch_id, job_id, EdgeDirection::Parents)
            .await
    }

    async fn get_children(&self, batch_id: i64, parent_id: i64) -> BatchResult<Vec<JobView>> {
        self.edge_views(batch_id, parent_id, EdgeDirection::Children)
            .await
    }

    /// The stage columns take precedence over the same columns in `extra`.
    #[instrument(skip(self, outcome, compare, extra), fields(stage = %stage))]
    async fn update_with_log_and_exit_code(
        &self,
        batch_id: i64,
        job_id: i64,
        stage: Stage,
        outcome: &StageOutcome,
        compare: &Filter<JobColumn>,
        extra: &Assignments<JobColumn>,
    ) -> BatchResult<u64> {
        let set = extra
            .clone()
            .set(JobColumn::log_uri(stage), outcome.log_uri.clone())
            .set(JobColumn::exit_code(stage), outcome.exit_code)
            .set(JobColumn::pod_status(stage), outcome.pod_status.clone());
        self.update(batch_id, job_id, compare, &set).await
    }

    async fn get_log_uri(
        &self,
        batch_id: i64,
        job_id: i64,
        stage: Stage,
    ) -> BatchResult<Option<String>> {
        self.get_stage_text(batch_id, job_id, JobColumn::log_uri(stage))
            .await
    }

    async fn get_pod_status(
        &self,
        batch_id: i64,
        job_id: i64,
        stage: Stage,
    ) -> BatchResult<Option<String>> {
        self.get_stage_text(batch_id, job_id, JobColumn::pod_status(stage))
            .await
    }
}
