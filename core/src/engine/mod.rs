//! Stage engine: walks a [`TaskSet`] in order, filters each stage against
//! the filesystem, and hands what is left to an [`ExecutionBackend`].

mod events;
mod progress;

use std::str::FromStr;
use std::time::Instant;

use uuid::Uuid;

use crate::backend::{ExecutionBackend, StageOutcome};
use crate::config::RunConfig;
use crate::error::{ConfigError, EngineError};
use crate::taskset::{provision_dirs, PendingStage, TaskSet};

pub use events::RunEvent;
pub use progress::ProgressMonitor;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventFormat {
    #[default]
    Text,
    Jsonl,
}

impl FromStr for EventFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "jsonl" => Ok(Self::Jsonl),
            other => Err(ConfigError::Invalid(format!("unknown event format '{other}'"))),
        }
    }
}

/// Options that apply to the whole run regardless of backend.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Log every would-be execution and report success without touching
    /// the filesystem, spawning, submitting, or writing scripts.
    pub dry_run: bool,
    pub event_format: EventFormat,
    /// Suppress text banners. JSONL events are still printed.
    pub quiet: bool,
    pub verbose: bool,
}

impl RunOptions {
    pub fn from_config(cfg: &RunConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            dry_run: cfg.dry_run,
            event_format: cfg.event_format.parse()?,
            quiet: false,
            verbose: false,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    pub outcome: StageOutcome,
    /// Commands skipped because their outputs already existed.
    pub finished: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub stages: Vec<StageReport>,
    pub duration_ms: u64,
}

impl RunReport {
    /// Commands handed to the backend (or logged, in a dry run).
    pub fn commands_run(&self) -> usize {
        self.stages
            .iter()
            .map(|s| match s.outcome {
                StageOutcome::Success { commands } => commands,
                _ => 0,
            })
            .sum()
    }

    pub fn skipped_stages(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.outcome == StageOutcome::Skipped)
            .count()
    }

    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }
}

pub struct Pipeline<'a> {
    taskset: &'a TaskSet,
    opts: &'a RunOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(taskset: &'a TaskSet, opts: &'a RunOptions) -> Self {
        Self { taskset, opts }
    }

    /// Runs `stages` (or every registered stage) through `backend`, one stage
    /// at a time. The first failing stage ends the run.
    pub async fn run(
        &self,
        backend: &mut dyn ExecutionBackend,
        stages: Option<&[String]>,
    ) -> Result<RunReport, EngineError> {
        let stage_names = self.taskset.resolve_stages(stages)?;
        let run_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        tracing::info!(
            run_id = %run_id,
            backend = backend.name(),
            stages = stage_names.len(),
            dry_run = self.opts.dry_run,
            "pipeline run starting"
        );
        events::emit_run_start(self.opts, &run_id, backend.name(), &stage_names);
        events::emit_execution_plan(self.opts, &run_id, &stage_names);

        let mut reports = Vec::with_capacity(stage_names.len());
        for (index, name) in stage_names.iter().enumerate() {
            let stage_start = Instant::now();
            let pending = self.taskset.pending(name)?;
            events::emit_stage_start(self.opts, &run_id, index, &pending);

            let outcome = self.run_stage(backend, &pending).await?;
            let duration_ms = stage_start.elapsed().as_millis() as u64;
            events::emit_stage_end(self.opts, &run_id, name, &outcome, duration_ms);

            if let StageOutcome::Failure(failures) = outcome {
                for failure in &failures {
                    tracing::error!(stage = %name, command = %failure.command, "{}", failure.message);
                }
                return Err(EngineError::StageFailed {
                    stage: name.clone(),
                    failures,
                });
            }

            reports.push(StageReport {
                name: name.clone(),
                outcome,
                finished: pending.finished,
                duration_ms,
            });
        }

        if !self.opts.dry_run {
            backend
                .finish()
                .await
                .map_err(|source| EngineError::Backend {
                    stage: stage_names.last().cloned().unwrap_or_default(),
                    source,
                })?;
        }

        let report = RunReport {
            run_id: run_id.clone(),
            stages: reports,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        events::emit_run_end(self.opts, &run_id, &report);
        tracing::info!(run_id = %run_id, commands = report.commands_run(), "pipeline run finished");
        Ok(report)
    }

    async fn run_stage(
        &self,
        backend: &mut dyn ExecutionBackend,
        pending: &PendingStage,
    ) -> Result<StageOutcome, EngineError> {
        if pending.is_empty() {
            tracing::debug!(
                stage = %pending.name,
                finished = pending.finished,
                "nothing to do, skipping stage"
            );
            return Ok(StageOutcome::Skipped);
        }

        if self.opts.dry_run {
            for dir in &pending.output_dirs {
                tracing::info!(stage = %pending.name, dir = %dir.display(), "dry run: would create directory");
            }
            for command in &pending.commands {
                tracing::info!(stage = %pending.name, command = %command, "dry run");
            }
            return Ok(StageOutcome::Success {
                commands: pending.len(),
            });
        }

        if backend.provisions_locally() {
            provision_dirs(&pending.output_dirs).map_err(|(path, source)| {
                EngineError::Provision {
                    stage: pending.name.clone(),
                    path,
                    source,
                }
            })?;
        }

        backend
            .execute_stage(pending)
            .await
            .map_err(|source| EngineError::Backend {
                stage: pending.name.clone(),
                source,
            })
    }
}
