use std::fmt;

use async_trait::async_trait;

use crate::error::BackendError;
use crate::taskset::PendingStage;

/// A command that ran (or tried to run) and did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// Rendered command line.
    pub command: String,
    /// Exit status, `None` when the process never started, was killed, or
    /// the failure came from a scheduler submission without a status.
    pub exit_code: Option<i32>,
    pub message: String,
}

impl CommandFailure {
    pub fn exited(command: impl Into<String>, exit_code: Option<i32>) -> Self {
        let message = match exit_code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        };
        Self {
            command: command.into(),
            exit_code,
            message,
        }
    }

    pub fn other(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            exit_code: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` {}", self.command, self.message)
    }
}

/// Result of handing one stage to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Every command succeeded, was submitted, or was written out.
    Success { commands: usize },
    Failure(Vec<CommandFailure>),
    /// Nothing left to do for this stage.
    Skipped,
}

impl StageOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Failure(_) => "failure",
            Self::Skipped => "skipped",
        }
    }
}

/// Strategy that turns a filtered stage into execution, a submission, or a
/// script.
///
/// The engine calls `execute_stage` once per stage, in order, and never calls
/// it again after a [`StageOutcome::Failure`].
#[async_trait]
pub trait ExecutionBackend: Send {
    fn name(&self) -> &str;

    /// Whether output directories must exist on this machine before the stage
    /// is handed over. Backends that only describe work return false.
    fn provisions_locally(&self) -> bool {
        true
    }

    async fn execute_stage(&mut self, stage: &PendingStage) -> Result<StageOutcome, BackendError>;

    /// Called once after the last stage of a successful run.
    async fn finish(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// One job-array submission to a cluster scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub batch_name: String,
    /// Batch that must complete successfully before this one may start.
    pub after_ok: Option<String>,
    pub width: usize,
    pub walltime: String,
    /// One shell line per command.
    pub commands: Vec<String>,
}

/// Bridge to an external batch scheduler. Implementations report whether the
/// submission was accepted, not whether the jobs eventually succeed.
#[async_trait]
pub trait SchedulerAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn submit(&self, request: &SubmissionRequest) -> Result<(), CommandFailure>;
}
