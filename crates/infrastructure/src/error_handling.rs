//! Enhanced error handling for repository operations with rich context
//!
//! Every table statement that fails is wrapped here: the driver error stays attached as the
//! source, and a Chinese description of the operation and entity is logged and returned.

use std::fmt;

use batch_core::BatchError;
use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::Error as SqlxError;
use tracing::{debug, error, instrument};

/// Operation context for repository operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Delete,
    Exists,
    BulkInsert,
    Migrate,
    Execute,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "查询"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Delete => write!(f, "删除"),
            RepositoryOperation::Exists => write!(f, "检查"),
            RepositoryOperation::BulkInsert => write!(f, "批量插入"),
            RepositoryOperation::Migrate => write!(f, "迁移"),
            RepositoryOperation::Execute => write!(f, "执行"),
        }
    }
}

/// Context information for table operations
#[derive(Debug, Clone)]
pub struct TableOperationContext {
    pub operation: RepositoryOperation,
    pub table: &'static str,
    pub batch_id: Option<i64>,
    pub job_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub additional_info: Option<String>,
}

impl TableOperationContext {
    pub fn new(operation: RepositoryOperation, table: &'static str) -> Self {
        Self {
            operation,
            table,
            batch_id: None,
            job_id: None,
            timestamp: Utc::now(),
            additional_info: None,
        }
    }

    pub fn with_batch_id(mut self, batch_id: i64) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_job_id(mut self, job_id: i64) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_additional_info(mut self, info: impl Into<String>) -> Self {
        self.additional_info = Some(info.into());
        self
    }

    pub fn entity_description(&self) -> String {
        let entity = match (self.batch_id, self.job_id) {
            (Some(batch_id), Some(job_id)) => format!("(批次: {batch_id}, 作业: {job_id})"),
            (Some(batch_id), None) => format!("(批次: {batch_id})"),
            (None, Some(job_id)) => format!("(作业: {job_id})"),
            (None, None) => String::new(),
        };
        if entity.is_empty() {
            format!("表 `{}`", self.table)
        } else {
            format!("表 `{}` {}", self.table, entity)
        }
    }

    /// Short label used by the retry executor in logs and metrics.
    pub fn label(&self) -> String {
        format!("{}:{}", self.table, self.operation)
    }
}

/// Enhanced error helpers for repository operations
pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    /// Wrap a driver error, keeping it as the source.
    #[instrument(skip_all, fields(
        operation = %context.operation,
        table = context.table,
        batch_id = ?context.batch_id,
        job_id = ?context.job_id,
        timestamp = %context.timestamp,
    ))]
    pub fn database_error(context: &TableOperationContext, error: SqlxError) -> BatchError {
        let entity_desc = context.entity_description();
        let operation_desc = context.operation.to_string();

        let error_msg = match &error {
            SqlxError::Database(db_error) => match db_error.kind() {
                ErrorKind::UniqueViolation => {
                    format!("{operation_desc}{entity_desc}时发生唯一约束冲突")
                }
                ErrorKind::ForeignKeyViolation => {
                    format!("{operation_desc}{entity_desc}时发生外键约束冲突")
                }
                ErrorKind::NotNullViolation => {
                    format!("{operation_desc}{entity_desc}时发生非空约束冲突")
                }
                _ => format!("{operation_desc}{entity_desc}时发生数据库错误"),
            },
            SqlxError::PoolClosed => format!("{operation_desc}{entity_desc}时数据库连接池已关闭"),
            SqlxError::PoolTimedOut => format!("{operation_desc}{entity_desc}时数据库连接池超时"),
            SqlxError::Io(_) => format!("{operation_desc}{entity_desc}时发生I/O错误"),
            SqlxError::ColumnDecode { .. } | SqlxError::Decode(_) => {
                format!("{operation_desc}{entity_desc}时解码结果失败")
            }
            _ => format!("{operation_desc}{entity_desc}时发生未知数据库错误"),
        };

        match &context.additional_info {
            Some(info) => error!(error = %error, info = %info, "{}", error_msg),
            None => error!(error = %error, "{}", error_msg),
        }

        BatchError::query_error(error_msg, error)
    }

    /// Wrap a conversion failure of a fetched row.
    pub fn integrity_error(context: &TableOperationContext, error: BatchError) -> BatchError {
        let msg = format!(
            "{}{}时数据不一致: {}",
            context.operation,
            context.entity_description(),
            error
        );
        error!("{}", msg);
        BatchError::integrity(msg)
    }

    pub fn log_operation_success(context: &TableOperationContext, rows: u64) {
        debug!(
            table = context.table,
            rows = rows,
            "{}{}成功",
            context.operation,
            context.entity_description()
        );
    }
}

/// Macro for creating table operation context easily
#[macro_export]
macro_rules! table_context {
    ($operation:expr, $table:expr) => {
        $crate::error_handling::TableOperationContext::new($operation, $table)
    };
    ($operation:expr, $table:expr, batch_id = $batch_id:expr) => {
        $crate::error_handling::TableOperationContext::new($operation, $table)
            .with_batch_id($batch_id)
    };
    ($operation:expr, $table:expr, batch_id = $batch_id:expr, job_id = $job_id:expr) => {
        $crate::error_handling::TableOperationContext::new($operation, $table)
            .with_batch_id($batch_id)
            .with_job_id($job_id)
    };
}
