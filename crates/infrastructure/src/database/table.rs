//! 通用记录表
//!
//! Minimal create / read / update / delete primitives over one named relation. Each operation
//! is one autocommitted statement.

use std::marker::PhantomData;

use batch_domain::{Assignments, BatchError, BatchResult, Column, Filter, Record};
use tracing::instrument;

use super::executor::StatementExecutor;
use super::mapping::Statement;
use super::predicate::{build_predicate, quote_identifier, Predicate};
use crate::error_handling::{RepositoryOperation, TableOperationContext};
use crate::table_context;

#[derive(Debug, Clone)]
pub struct RecordTable<C> {
    executor: StatementExecutor,
    table: &'static str,
    autoincrement: bool,
    _columns: PhantomData<C>,
}

impl<C: Column + Send + Sync> RecordTable<C> {
    pub fn new(executor: StatementExecutor, table: &'static str) -> Self {
        Self {
            executor,
            table,
            autoincrement: false,
            _columns: PhantomData,
        }
    }

    /// The relation has an autoincrement `id` that [`RecordTable::create`] reports.
    pub fn with_autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.table
    }

    pub fn executor(&self) -> &StatementExecutor {
        &self.executor
    }

    fn context(&self, operation: RepositoryOperation) -> TableOperationContext {
        table_context!(operation, self.table)
    }

    /// Writes require at least one condition.
    fn require_scoped(&self, predicate: &Predicate, operation: &str) -> BatchResult<()> {
        if predicate.is_empty() {
            return Err(BatchError::invalid_argument(format!(
                "{operation}表 {} 时必须指定条件",
                self.table
            )));
        }
        Ok(())
    }

    /// Insert one row; returns the autoincrement id, or 0 when the relation has none.
    #[instrument(skip_all, fields(table = self.table))]
    pub async fn create(&self, fields: &Assignments<C>) -> BatchResult<i64> {
        if fields.is_empty() {
            return Err(BatchError::invalid_argument(format!(
                "向表 {} 插入记录时至少需要一个字段",
                self.table
            )));
        }

        let columns = fields
            .columns()
            .map(|c| quote_identifier(c.name()))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; fields.len()].join(", ");
        let statement = Statement::new(
            format!(
                "INSERT INTO {} ({columns}) VALUES ({placeholders})",
                quote_identifier(self.table)
            ),
            fields.iter().map(|(_, v)| v.clone()).collect(),
        );

        let context = self.context(RepositoryOperation::Create);
        if self.autoincrement {
            self.executor.execute_insert(&statement, &context).await
        } else {
            self.executor.execute(&statement, &context).await?;
            Ok(0)
        }
    }

    /// `UPDATE … SET … WHERE <filter>`; an empty `set` touches nothing and returns 0.
    /// An empty `filter` is rejected.
    #[instrument(skip_all, fields(table = self.table))]
    pub async fn update(&self, filter: &Filter<C>, set: &Assignments<C>) -> BatchResult<u64> {
        self.update_where(build_predicate(filter, None), set, self.context(RepositoryOperation::Update))
            .await
    }

    pub(crate) async fn update_where(
        &self,
        predicate: Predicate,
        set: &Assignments<C>,
        context: TableOperationContext,
    ) -> BatchResult<u64> {
        self.require_scoped(&predicate, "更新")?;
        if set.is_empty() {
            return Ok(0);
        }

        let assignments = set
            .columns()
            .map(|c| format!("{} = ?", quote_identifier(c.name())))
            .collect::<Vec<_>>()
            .join(", ");
        let mut binds: Vec<_> = set.iter().map(|(_, v)| v.clone()).collect();
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE {}",
            quote_identifier(self.table),
            predicate.sql()
        );
        binds.extend(predicate.into_binds());

        let result = self
            .executor
            .execute(&Statement::new(sql, binds), &context)
            .await?;
        Ok(result.rows_affected())
    }

    /// All rows matching `filter`. A projection, when given, must name at least one column.
    #[instrument(skip_all, fields(table = self.table))]
    pub async fn get(&self, filter: &Filter<C>, projection: Option<&[C]>) -> BatchResult<Vec<Record>> {
        self.get_where(build_predicate(filter, None), projection).await
    }

    pub(crate) async fn get_where(
        &self,
        predicate: Predicate,
        projection: Option<&[C]>,
    ) -> BatchResult<Vec<Record>> {
        let select = match projection {
            Some([]) => {
                return Err(BatchError::invalid_argument(format!(
                    "查询表 {} 时投影列不能为空",
                    self.table
                )))
            }
            Some(columns) => columns
                .iter()
                .map(|c| quote_identifier(c.name()))
                .collect::<Vec<_>>()
                .join(", "),
            None => "*".to_string(),
        };
        let sql = format!(
            "SELECT {select} FROM {} WHERE {}",
            quote_identifier(self.table),
            predicate.sql()
        );

        self.executor
            .fetch_records(
                &Statement::new(sql, predicate.into_binds()),
                &self.context(RepositoryOperation::Read),
            )
            .await
    }

    #[instrument(skip_all, fields(table = self.table))]
    pub async fn get_all(&self) -> BatchResult<Vec<Record>> {
        self.get_where(Predicate::new(), None).await
    }

    #[instrument(skip_all, fields(table = self.table))]
    pub async fn exists(&self, filter: &Filter<C>) -> BatchResult<bool> {
        let predicate = build_predicate(filter, None);
        let sql = format!(
            "SELECT COUNT(1) FROM {} WHERE {}",
            quote_identifier(self.table),
            predicate.sql()
        );
        let count = self
            .executor
            .fetch_count(
                &Statement::new(sql, predicate.into_binds()),
                &self.context(RepositoryOperation::Exists),
            )
            .await?;
        Ok(count >= 1)
    }

    /// An empty `filter` is rejected.
    #[instrument(skip_all, fields(table = self.table))]
    pub async fn delete(&self, filter: &Filter<C>) -> BatchResult<u64> {
        let predicate = build_predicate(filter, None);
        self.require_scoped(&predicate, "删除")?;
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            quote_identifier(self.table),
            predicate.sql()
        );
        let result = self
            .executor
            .execute(
                &Statement::new(sql, predicate.into_binds()),
                &self.context(RepositoryOperation::Delete),
            )
            .await?;
        Ok(result.rows_affected())
    }
}
