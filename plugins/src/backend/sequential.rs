use std::time::Duration;

use async_trait::async_trait;
use stagerun_core::api::{BackendError, ExecutionBackend, PendingStage, StageOutcome};

use crate::process::run_command;

/// Runs commands one after another in the current process tree. The first
/// failure ends the stage; later commands of that stage never start.
#[derive(Debug, Default)]
pub struct SequentialBackend {
    timeout: Option<Duration>,
}

impl SequentialBackend {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ExecutionBackend for SequentialBackend {
    fn name(&self) -> &str {
        "sequential"
    }

    async fn execute_stage(&mut self, stage: &PendingStage) -> Result<StageOutcome, BackendError> {
        for command in &stage.commands {
            tracing::info!(stage = %stage.name, command = %command, "running");
            if let Err(failure) = run_command(command, self.timeout).await {
                tracing::error!(stage = %stage.name, command = %command, "{}", failure.message);
                return Ok(StageOutcome::Failure(vec![failure]));
            }
        }
        Ok(StageOutcome::Success {
            commands: stage.len(),
        })
    }
}
