use async_trait::async_trait;
use stagerun_core::api::{
    BackendError, ExecutionBackend, PendingStage, SchedulerAdapter, StageOutcome,
    SubmissionRequest,
};

/// Submits each stage as one job array to a cluster scheduler, chained so a
/// stage's jobs start only after the previous submission completed.
///
/// The run returns once everything is queued; job outcomes are the
/// scheduler's business.
pub struct BatchQueueBackend {
    adapter: Box<dyn SchedulerAdapter>,
    width: usize,
    default_walltime: String,
    name_prefix: String,
    counter: usize,
    last_batch: Option<String>,
}

impl BatchQueueBackend {
    pub fn new(adapter: Box<dyn SchedulerAdapter>, width: usize, default_walltime: impl Into<String>) -> Self {
        Self {
            adapter,
            width: width.max(1),
            default_walltime: default_walltime.into(),
            name_prefix: String::new(),
            counter: 0,
            last_batch: None,
        }
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Name of the most recent accepted submission.
    pub fn last_batch(&self) -> Option<&str> {
        self.last_batch.as_deref()
    }

    fn request_for(&mut self, stage: &PendingStage) -> SubmissionRequest {
        self.counter += 1;
        let width = stage
            .hints
            .processors
            .map_or(self.width, |p| p.min(self.width))
            .max(1);
        SubmissionRequest {
            batch_name: format!("{}{}_{:03}", self.name_prefix, stage.name, self.counter),
            after_ok: self.last_batch.clone(),
            width,
            walltime: stage
                .hints
                .walltime
                .clone()
                .unwrap_or_else(|| self.default_walltime.clone()),
            commands: stage.commands.iter().map(|c| c.shell_line()).collect(),
        }
    }
}

#[async_trait]
impl ExecutionBackend for BatchQueueBackend {
    fn name(&self) -> &str {
        "batch"
    }

    async fn execute_stage(&mut self, stage: &PendingStage) -> Result<StageOutcome, BackendError> {
        let request = self.request_for(stage);
        if request.walltime.trim().is_empty() {
            return Err(BackendError::Adapter(format!(
                "batch {} has no walltime",
                request.batch_name
            )));
        }
        tracing::info!(
            stage = %stage.name,
            batch = %request.batch_name,
            after_ok = request.after_ok.as_deref().unwrap_or("-"),
            commands = request.commands.len(),
            adapter = self.adapter.name(),
            "submitting batch"
        );

        match self.adapter.submit(&request).await {
            Ok(()) => {
                self.last_batch = Some(request.batch_name);
                Ok(StageOutcome::Success {
                    commands: stage.len(),
                })
            }
            Err(failure) => {
                tracing::error!(stage = %stage.name, batch = %request.batch_name, "{failure}");
                Ok(StageOutcome::Failure(vec![failure]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;
    use stagerun_core::api::{Command, CommandFailure, Stage, StageHints, TaskSet};

    #[derive(Clone, Default)]
    struct FakeScheduler {
        submitted: Arc<Mutex<Vec<SubmissionRequest>>>,
        reject: bool,
    }

    #[async_trait]
    impl SchedulerAdapter for FakeScheduler {
        fn name(&self) -> &str {
            "fake"
        }

        async fn submit(&self, request: &SubmissionRequest) -> Result<(), CommandFailure> {
            self.submitted.lock().unwrap().push(request.clone());
            if self.reject {
                return Err(CommandFailure::exited(request.batch_name.clone(), Some(1)));
            }
            Ok(())
        }
    }

    fn pending(name: &str, commands: usize, hints: StageHints) -> PendingStage {
        let mut ts = TaskSet::new();
        for i in 0..commands {
            ts.add_command(name, Command::new("echo").arg(format!("job {i}")));
        }
        ts.set_hints(name, hints);
        let stage: &Stage = ts.get(name).unwrap();
        PendingStage::from_stage(stage)
    }

    #[tokio::test]
    async fn submissions_chain_on_previous_batch() {
        let fake = FakeScheduler::default();
        let mut backend = BatchQueueBackend::new(Box::new(fake.clone()), 8, "10:00:00")
            .with_name_prefix("proj_");

        let reg_hints = StageHints {
            walltime: Some("4:00:00".into()),
            processors: Some(2),
        };
        backend
            .execute_stage(&pending("prep", 3, StageHints::default()))
            .await
            .unwrap();
        backend
            .execute_stage(&pending("reg", 1, reg_hints))
            .await
            .unwrap();

        let sent = fake.submitted.lock().unwrap().clone();
        assert_eq!(sent[0].batch_name, "proj_prep_001");
        assert_eq!(sent[0].after_ok, None);
        assert_eq!(sent[0].width, 8);
        assert_eq!(sent[0].walltime, "10:00:00");
        assert_eq!(sent[0].commands, vec!["echo 'job 0'", "echo 'job 1'", "echo 'job 2'"]);

        assert_eq!(sent[1].batch_name, "proj_reg_002");
        assert_eq!(sent[1].after_ok.as_deref(), Some("proj_prep_001"));
        assert_eq!(sent[1].width, 2);
        assert_eq!(sent[1].walltime, "4:00:00");
        assert_eq!(backend.last_batch(), Some("proj_reg_002"));
    }

    #[tokio::test]
    async fn rejected_submission_fails_stage_and_keeps_chain() {
        let fake = FakeScheduler {
            reject: true,
            ..Default::default()
        };
        let mut backend = BatchQueueBackend::new(Box::new(fake), 4, "10:00:00");

        let outcome = backend
            .execute_stage(&pending("prep", 1, StageHints::default()))
            .await
            .unwrap();

        assert!(outcome.is_failure());
        assert_eq!(backend.last_batch(), None);
    }

    #[tokio::test]
    async fn missing_walltime_is_not_submitted() {
        let fake = FakeScheduler::default();
        let mut backend = BatchQueueBackend::new(Box::new(fake.clone()), 4, " ");

        let err = backend
            .execute_stage(&pending("prep", 1, StageHints::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, BackendError::Adapter(msg) if msg.contains("prep_001")));
        assert!(fake.submitted.lock().unwrap().is_empty());
    }
}
