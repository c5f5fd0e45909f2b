use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use batch_core::BatchError;

use crate::query::Value;

/// 作业状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Ready,
    Running,
    Success,
    Failed,
    Error,
    Cancelled,
}

impl JobState {
    /// States in which a parent still blocks its children.
    pub const INCOMPLETE: [JobState; 3] = [JobState::Pending, JobState::Ready, JobState::Running];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "Pending",
            JobState::Ready => "Ready",
            JobState::Running => "Running",
            JobState::Success => "Success",
            JobState::Failed => "Failed",
            JobState::Error => "Error",
            JobState::Cancelled => "Cancelled",
        }
    }

    pub fn is_complete(&self) -> bool {
        !Self::INCOMPLETE.contains(self)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(JobState::Pending),
            "Ready" => Ok(JobState::Ready),
            "Running" => Ok(JobState::Running),
            "Success" => Ok(JobState::Success),
            "Failed" => Ok(JobState::Failed),
            "Error" => Ok(JobState::Error),
            "Cancelled" => Ok(JobState::Cancelled),
            _ => Err(BatchError::UnknownJobState(s.to_string())),
        }
    }
}

impl From<JobState> for Value {
    fn from(state: JobState) -> Self {
        Value::Text(state.as_str().to_string())
    }
}

/// Pipeline stage of a job. Only these three tokens exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Input,
    Main,
    Output,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Input, Stage::Main, Stage::Output];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Main => "main",
            Stage::Output => "output",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Stage::Input => 0,
            Stage::Main => 1,
            Stage::Output => 2,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(Stage::Input),
            "main" => Ok(Stage::Main),
            "output" => Ok(Stage::Output),
            _ => Err(BatchError::UnknownStage(s.to_string())),
        }
    }
}

/// 批次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: i64,
    pub user: String,
    pub userdata: Option<String>,
    pub state: String,
    pub attributes: Option<serde_json::Value>,
    pub callback: Option<String>,
    pub cancelled: bool,
    pub deleted: bool,
    pub n_jobs: i64,
    pub n_completed: i64,
}

impl Batch {
    /// A batch may be reaped once it is soft-deleted and every job has finished.
    pub fn is_gc_eligible(&self) -> bool {
        self.deleted && self.n_completed == self.n_jobs
    }
}

/// Fields supplied when a batch is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBatch {
    pub user: String,
    pub userdata: Option<String>,
    pub state: String,
    pub attributes: Option<serde_json::Value>,
    pub callback: Option<String>,
    pub n_jobs: i64,
}

impl NewBatch {
    pub fn new(user: impl Into<String>, n_jobs: i64) -> Self {
        Self {
            user: user.into(),
            userdata: None,
            state: "Running".to_string(),
            attributes: None,
            callback: None,
            n_jobs,
        }
    }

    pub fn with_userdata(mut self, userdata: impl Into<String>) -> Self {
        self.userdata = Some(userdata.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    pub fn with_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = Some(callback.into());
        self
    }
}

/// Log location, exit code and pod status of one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub log_uri: Option<String>,
    pub exit_code: Option<i64>,
    pub pod_status: Option<String>,
}

/// 作业
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub batch_id: i64,
    pub job_id: i64,
    pub state: JobState,
    pub pvc_size: Option<String>,
    pub callback: Option<String>,
    pub attributes: Option<serde_json::Value>,
    pub tasks: Vec<String>,
    pub task_idx: i64,
    pub always_run: bool,
    pub duration: Option<i64>,
    pub token: String,
    pub input: StageRecord,
    pub main: StageRecord,
    pub output: StageRecord,
}

impl Job {
    pub fn stage(&self, stage: Stage) -> &StageRecord {
        match stage {
            Stage::Input => &self.input,
            Stage::Main => &self.main,
            Stage::Output => &self.output,
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey {
            batch_id: self.batch_id,
            job_id: self.job_id,
        }
    }
}

/// A job joined with the owning batch's user-facing attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    pub cancelled: bool,
    pub user: String,
    pub userdata: Option<String>,
}

/// Exactly the columns written when a job is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub batch_id: i64,
    pub job_id: i64,
    pub state: JobState,
    pub pvc_size: Option<String>,
    pub callback: Option<String>,
    pub attributes: Option<serde_json::Value>,
    pub tasks: Vec<String>,
    pub task_idx: i64,
    pub always_run: bool,
    pub duration: Option<i64>,
    pub token: String,
}

impl NewJob {
    pub fn new(batch_id: i64, job_id: i64, token: impl Into<String>) -> Self {
        Self {
            batch_id,
            job_id,
            state: JobState::Pending,
            pvc_size: None,
            callback: None,
            attributes: None,
            tasks: Stage::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            task_idx: 0,
            always_run: false,
            duration: None,
            token: token.into(),
        }
    }

    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = state;
        self
    }

    pub fn with_pvc_size(mut self, pvc_size: impl Into<String>) -> Self {
        self.pvc_size = Some(pvc_size.into());
        self
    }

    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = Some(callback.into());
        self
    }

    pub fn with_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_tasks(mut self, tasks: Vec<String>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_always_run(mut self, always_run: bool) -> Self {
        self.always_run = always_run;
        self
    }

    pub fn key(&self) -> JobKey {
        JobKey {
            batch_id: self.batch_id,
            job_id: self.job_id,
        }
    }
}

/// Dependency edge: `job_id` may not run before `parent_id` has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobParent {
    pub batch_id: i64,
    pub job_id: i64,
    pub parent_id: i64,
}

impl JobParent {
    pub fn new(batch_id: i64, job_id: i64, parent_id: i64) -> Self {
        Self {
            batch_id,
            job_id,
            parent_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub batch_id: i64,
    pub job_id: i64,
}

/// What a finished stage reports back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub log_uri: Option<String>,
    pub exit_code: Option<i64>,
    pub pod_status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_parsing_fails_closed() {
        assert_eq!("main".parse::<Stage>().unwrap(), Stage::Main);
        assert_eq!("output".parse::<Stage>().unwrap(), Stage::Output);

        let err = "setup".parse::<Stage>().unwrap_err();
        assert!(matches!(err, BatchError::UnknownStage(ref s) if s == "setup"));
        assert!("Main".parse::<Stage>().is_err());
    }

    #[test]
    fn test_job_state_tokens() {
        for state in JobState::INCOMPLETE {
            assert!(!state.is_complete());
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
        assert!(JobState::Success.is_complete());
        assert!(JobState::Cancelled.is_complete());
        assert!("Done".parse::<JobState>().is_err());
    }

    #[test]
    fn test_gc_eligibility() {
        let mut batch = Batch {
            id: 1,
            user: "alice".into(),
            userdata: None,
            state: "Complete".into(),
            attributes: None,
            callback: None,
            cancelled: false,
            deleted: true,
            n_jobs: 3,
            n_completed: 3,
        };
        assert!(batch.is_gc_eligible());

        batch.n_completed = 2;
        assert!(!batch.is_gc_eligible());

        batch.n_completed = 3;
        batch.deleted = false;
        assert!(!batch.is_gc_eligible());
    }

    #[test]
    fn test_new_job_defaults() {
        let job = NewJob::new(4, 1, "tok");
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.tasks, vec!["input", "main", "output"]);
        assert_eq!(job.key(), JobKey { batch_id: 4, job_id: 1 });
    }
}
