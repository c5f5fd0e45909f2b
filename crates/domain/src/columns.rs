//! 表列定义
//!
//! Every column a caller may name is a variant here, so a typo is a compile error rather than a
//! malformed statement.

use crate::entities::Stage;
use crate::query::Column;

/// Columns of the `batch` relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchColumn {
    Id,
    User,
    Userdata,
    State,
    Attributes,
    Callback,
    Cancelled,
    Deleted,
    NJobs,
    NCompleted,
}

impl Column for BatchColumn {
    fn name(&self) -> &'static str {
        match self {
            BatchColumn::Id => "id",
            BatchColumn::User => "user",
            BatchColumn::Userdata => "userdata",
            BatchColumn::State => "state",
            BatchColumn::Attributes => "attributes",
            BatchColumn::Callback => "callback",
            BatchColumn::Cancelled => "cancelled",
            BatchColumn::Deleted => "deleted",
            BatchColumn::NJobs => "n_jobs",
            BatchColumn::NCompleted => "n_completed",
        }
    }
}

/// Per-stage attribute; the concrete column is always resolved through a [`Stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageField {
    LogUri,
    ExitCode,
    PodStatus,
}

const LOG_URI_COLUMNS: [&str; 3] = ["input_log_uri", "main_log_uri", "output_log_uri"];
const EXIT_CODE_COLUMNS: [&str; 3] = ["input_exit_code", "main_exit_code", "output_exit_code"];
const POD_STATUS_COLUMNS: [&str; 3] = [
    "input_pod_status",
    "main_pod_status",
    "output_pod_status",
];

impl StageField {
    pub const ALL: [StageField; 3] = [StageField::LogUri, StageField::ExitCode, StageField::PodStatus];

    pub fn column_for(&self, stage: Stage) -> &'static str {
        let columns = match self {
            StageField::LogUri => &LOG_URI_COLUMNS,
            StageField::ExitCode => &EXIT_CODE_COLUMNS,
            StageField::PodStatus => &POD_STATUS_COLUMNS,
        };
        columns[stage.index()]
    }
}

/// Columns of the `jobs` relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobColumn {
    BatchId,
    JobId,
    State,
    PvcSize,
    Callback,
    Attributes,
    Tasks,
    TaskIdx,
    AlwaysRun,
    Duration,
    Token,
    Stage(Stage, StageField),
}

impl JobColumn {
    /// Columns written when a job is first created.
    pub const INSERT: [JobColumn; 11] = [
        JobColumn::BatchId,
        JobColumn::JobId,
        JobColumn::State,
        JobColumn::PvcSize,
        JobColumn::Callback,
        JobColumn::Attributes,
        JobColumn::Tasks,
        JobColumn::TaskIdx,
        JobColumn::AlwaysRun,
        JobColumn::Duration,
        JobColumn::Token,
    ];

    pub fn log_uri(stage: Stage) -> Self {
        JobColumn::Stage(stage, StageField::LogUri)
    }

    pub fn exit_code(stage: Stage) -> Self {
        JobColumn::Stage(stage, StageField::ExitCode)
    }

    pub fn pod_status(stage: Stage) -> Self {
        JobColumn::Stage(stage, StageField::PodStatus)
    }
}

impl Column for JobColumn {
    fn name(&self) -> &'static str {
        match self {
            JobColumn::BatchId => "batch_id",
            JobColumn::JobId => "job_id",
            JobColumn::State => "state",
            JobColumn::PvcSize => "pvc_size",
            JobColumn::Callback => "callback",
            JobColumn::Attributes => "attributes",
            JobColumn::Tasks => "tasks",
            JobColumn::TaskIdx => "task_idx",
            JobColumn::AlwaysRun => "always_run",
            JobColumn::Duration => "duration",
            JobColumn::Token => "token",
            JobColumn::Stage(stage, field) => field.column_for(*stage),
        }
    }
}

/// Batch attributes exposed on every job read. They belong to the batch and cannot be
/// written through the job table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchViewField {
    Cancelled,
    User,
    Userdata,
}

impl BatchViewField {
    pub const ALL: [BatchViewField; 3] = [
        BatchViewField::Cancelled,
        BatchViewField::User,
        BatchViewField::Userdata,
    ];

    pub fn batch_column(&self) -> BatchColumn {
        match self {
            BatchViewField::Cancelled => BatchColumn::Cancelled,
            BatchViewField::User => BatchColumn::User,
            BatchViewField::Userdata => BatchColumn::Userdata,
        }
    }
}

/// A field that can be projected from the joined job view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobField {
    Job(JobColumn),
    BatchView(BatchViewField),
}

impl JobField {
    pub fn name(&self) -> &'static str {
        match self {
            JobField::Job(column) => column.name(),
            JobField::BatchView(field) => field.batch_column().name(),
        }
    }
}

impl From<JobColumn> for JobField {
    fn from(column: JobColumn) -> Self {
        JobField::Job(column)
    }
}

impl From<BatchViewField> for JobField {
    fn from(field: BatchViewField) -> Self {
        JobField::BatchView(field)
    }
}

/// Columns of the `jobs-parents` relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobParentColumn {
    BatchId,
    JobId,
    ParentId,
}

impl JobParentColumn {
    pub const ALL: [JobParentColumn; 3] = [
        JobParentColumn::BatchId,
        JobParentColumn::JobId,
        JobParentColumn::ParentId,
    ];
}

impl Column for JobParentColumn {
    fn name(&self) -> &'static str {
        match self {
            JobParentColumn::BatchId => "batch_id",
            JobParentColumn::JobId => "job_id",
            JobParentColumn::ParentId => "parent_id",
        }
    }
}
