use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use stagerun_core::api::{
    BackendError, CommandFailure, ExecutionBackend, PendingStage, ProgressMonitor, StageOutcome,
};
use tokio::sync::Semaphore;

use crate::process::run_command;

/// Runs every command of a stage on a pool of `width` concurrent processes.
///
/// All commands are dispatched even after one fails, and the stage waits for
/// every one of them before reporting.
#[derive(Debug)]
pub struct ParallelBackend {
    width: usize,
    timeout: Option<Duration>,
    progress: bool,
}

impl ParallelBackend {
    pub fn new(width: usize, timeout: Option<Duration>) -> Self {
        Self {
            width: width.max(1),
            timeout,
            progress: false,
        }
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

#[async_trait]
impl ExecutionBackend for ParallelBackend {
    fn name(&self) -> &str {
        "parallel"
    }

    async fn execute_stage(&mut self, stage: &PendingStage) -> Result<StageOutcome, BackendError> {
        let sem = Arc::new(Semaphore::new(self.width));
        let monitor = Arc::new(Mutex::new(ProgressMonitor::new(stage.len(), self.progress)));
        if let Ok(m) = monitor.lock() {
            m.set_stage(&stage.name);
        }

        let mut futs = FuturesUnordered::new();
        for (index, command) in stage.commands.iter().cloned().enumerate() {
            let sem = sem.clone();
            let monitor = monitor.clone();
            let timeout = self.timeout;
            let stage_name = stage.name.clone();

            futs.push(async move {
                let _permit = match sem.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        let failure = CommandFailure::other(
                            command.render(),
                            "worker pool closed unexpectedly",
                        );
                        return (index, Err(failure));
                    }
                };

                tracing::info!(stage = %stage_name, command = %command, "running");
                if let Ok(mut m) = monitor.lock() {
                    m.start_command(index, &command.render());
                }
                let started = Instant::now();
                let result = run_command(&command, timeout).await;
                if let Ok(mut m) = monitor.lock() {
                    m.complete_command(
                        index,
                        result.is_ok(),
                        started.elapsed().as_millis() as u64,
                    );
                }
                (index, result)
            });
        }

        let mut failures: Vec<(usize, CommandFailure)> = Vec::new();
        while let Some((index, result)) = futs.next().await {
            if let Err(failure) = result {
                tracing::error!(stage = %stage.name, command = %failure.command, "{}", failure.message);
                failures.push((index, failure));
            }
        }

        if let Ok(m) = monitor.lock() {
            m.finish(failures.is_empty());
        }

        if failures.is_empty() {
            Ok(StageOutcome::Success {
                commands: stage.len(),
            })
        } else {
            failures.sort_by_key(|(index, _)| *index);
            Ok(StageOutcome::Failure(
                failures.into_iter().map(|(_, f)| f).collect(),
            ))
        }
    }
}
