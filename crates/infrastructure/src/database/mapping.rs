//! Shared database mapping utilities
//!
//! Statement assembly, bind-parameter encoding and the conversion of driver rows into
//! [`Record`]s and domain entities.

use batch_domain::{
    Batch, BatchError, BatchResult, Column, Job, JobColumn, JobParent, JobParentColumn, JobView,
    NewJob, Record, Stage, StageField, StageRecord, Value,
};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Column as _, Row, ValueRef};

use super::predicate::quote_identifier;

/// SQL text plus its bind values in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, binds: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            binds,
        }
    }

    pub fn query(&self) -> Query<'_, Any, AnyArguments<'_>> {
        self.binds
            .iter()
            .fold(sqlx::query(&self.sql), |query, value| bind_value(query, value))
    }
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &Value,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
    }
}

/// Decode every column of `row`, keyed by its result name.
pub fn row_to_record(row: &AnyRow) -> Result<Record, sqlx::Error> {
    let mut record = Record::new();
    for (index, column) in row.columns().iter().enumerate() {
        record.insert(column.name(), decode_value(row, index)?);
    }
    Ok(record)
}

fn decode_value(row: &AnyRow, index: usize) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }
    if let Ok(b) = row.try_get::<bool, _>(index) {
        return Ok(Value::Bool(b));
    }
    if let Ok(i) = row.try_get::<i64, _>(index) {
        return Ok(Value::Int(i));
    }
    if let Ok(f) = row.try_get::<f64, _>(index) {
        return Ok(Value::Float(f));
    }
    if let Ok(s) = row.try_get::<String, _>(index) {
        return Ok(Value::Text(s));
    }
    row.try_get::<Vec<u8>, _>(index).map(Value::Bytes)
}

/// A statically-typed row that can be bulk inserted.
pub trait InsertRow {
    type Column: Column + 'static;

    fn columns() -> &'static [Self::Column];

    /// Values in the order of [`InsertRow::columns`].
    fn values(&self) -> BatchResult<Vec<Value>>;
}

impl InsertRow for NewJob {
    type Column = JobColumn;

    fn columns() -> &'static [JobColumn] {
        &JobColumn::INSERT
    }

    fn values(&self) -> BatchResult<Vec<Value>> {
        Ok(vec![
            Value::Int(self.batch_id),
            Value::Int(self.job_id),
            self.state.into(),
            self.pvc_size.clone().into(),
            self.callback.clone().into(),
            MappingHelpers::json_column(self.attributes.as_ref())?,
            Value::Text(serde_json::to_string(&self.tasks)?),
            Value::Int(self.task_idx),
            Value::Bool(self.always_run),
            self.duration.into(),
            Value::Text(self.token.clone()),
        ])
    }
}

impl InsertRow for JobParent {
    type Column = JobParentColumn;

    fn columns() -> &'static [JobParentColumn] {
        &JobParentColumn::ALL
    }

    fn values(&self) -> BatchResult<Vec<Value>> {
        Ok(vec![
            Value::Int(self.batch_id),
            Value::Int(self.job_id),
            Value::Int(self.parent_id),
        ])
    }
}

/// Multi-row `INSERT` statements of at most `max_rows` rows each, with the row count of each.
pub fn bulk_insert_statements<R: InsertRow>(
    table: &str,
    rows: &[R],
    max_rows: usize,
) -> BatchResult<Vec<(Statement, u64)>> {
    if max_rows == 0 {
        return Err(BatchError::invalid_argument("每条语句的最大行数必须大于0"));
    }

    let columns = R::columns()
        .iter()
        .map(|c| quote_identifier(c.name()))
        .collect::<Vec<_>>()
        .join(", ");
    let row_placeholders = format!("({})", vec!["?"; R::columns().len()].join(", "));

    rows.chunks(max_rows)
        .map(|chunk| {
            let mut binds = Vec::with_capacity(chunk.len() * R::columns().len());
            for row in chunk {
                binds.extend(row.values()?);
            }
            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                quote_identifier(table),
                columns,
                vec![row_placeholders.as_str(); chunk.len()].join(", ")
            );
            Ok((Statement::new(sql, binds), chunk.len() as u64))
        })
        .collect()
}

/// Helper functions for turning fetched records into entities
pub struct MappingHelpers;

impl MappingHelpers {
    /// JSON blobs are stored as text.
    pub fn json_column(value: Option<&serde_json::Value>) -> BatchResult<Value> {
        value
            .map(|v| serde_json::to_string(v).map(Value::Text))
            .transpose()
            .map(|v| v.unwrap_or(Value::Null))
            .map_err(Into::into)
    }

    pub fn parse_json(record: &Record, name: &str) -> BatchResult<Option<serde_json::Value>> {
        record
            .opt_string(name)?
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| BatchError::Serialization(format!("解析列 {name} 失败: {e}")))
    }

    pub fn parse_tasks(record: &Record) -> BatchResult<Vec<String>> {
        let raw = record.string("tasks")?;
        serde_json::from_str(&raw)
            .map_err(|e| BatchError::Serialization(format!("解析任务列表失败: {e}")))
    }

    pub fn record_to_batch(record: &Record) -> BatchResult<Batch> {
        Ok(Batch {
            id: record.i64("id")?,
            user: record.string("user")?,
            userdata: record.opt_string("userdata")?,
            state: record.string("state")?,
            attributes: Self::parse_json(record, "attributes")?,
            callback: record.opt_string("callback")?,
            cancelled: record.bool("cancelled")?,
            deleted: record.bool("deleted")?,
            n_jobs: record.i64("n_jobs")?,
            n_completed: record.i64("n_completed")?,
        })
    }

    fn stage_record(record: &Record, stage: Stage) -> BatchResult<StageRecord> {
        Ok(StageRecord {
            log_uri: record.opt_string(StageField::LogUri.column_for(stage))?,
            exit_code: record.opt_i64(StageField::ExitCode.column_for(stage))?,
            pod_status: record.opt_string(StageField::PodStatus.column_for(stage))?,
        })
    }

    pub fn record_to_job(record: &Record) -> BatchResult<Job> {
        Ok(Job {
            batch_id: record.i64("batch_id")?,
            job_id: record.i64("job_id")?,
            state: record.string("state")?.parse()?,
            pvc_size: record.opt_string("pvc_size")?,
            callback: record.opt_string("callback")?,
            attributes: Self::parse_json(record, "attributes")?,
            tasks: Self::parse_tasks(record)?,
            task_idx: record.i64("task_idx")?,
            always_run: record.bool("always_run")?,
            duration: record.opt_i64("duration")?,
            token: record.string("token")?,
            input: Self::stage_record(record, Stage::Input)?,
            main: Self::stage_record(record, Stage::Main)?,
            output: Self::stage_record(record, Stage::Output)?,
        })
    }

    pub fn record_to_job_view(record: &Record) -> BatchResult<JobView> {
        Ok(JobView {
            job: Self::record_to_job(record)?,
            cancelled: record.bool("cancelled")?,
            user: record.string("user")?,
            userdata: record.opt_string("userdata")?,
        })
    }
}
