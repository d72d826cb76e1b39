use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stagerun_core::api::{
    Command, CommandFailure, RunOptions, SchedulerAdapter, SubmissionRequest, TaskSet,
};

pub fn quiet() -> RunOptions {
    RunOptions {
        quiet: true,
        ..RunOptions::default()
    }
}

/// `prep` touches `out/a.img` and `out/b.img`; `reg` copies `a.img` into
/// `xfm/a.xfm`.
pub fn prep_reg_plan(root: &Path) -> TaskSet {
    let out = root.join("out");
    let mut ts = TaskSet::new();
    ts.stage("prep")
        .command(Command::new("touch").output(out.join("a.img")))
        .command(Command::new("touch").output(out.join("b.img")));
    ts.add_command(
        "reg",
        Command::new("cp")
            .input(out.join("a.img"))
            .output(root.join("xfm/a.xfm")),
    );
    ts
}

#[derive(Clone, Default)]
pub struct RecordingScheduler {
    pub submitted: Arc<Mutex<Vec<SubmissionRequest>>>,
    pub reject_batch: Option<String>,
}

#[async_trait]
impl SchedulerAdapter for RecordingScheduler {
    fn name(&self) -> &str {
        "recording"
    }

    async fn submit(&self, request: &SubmissionRequest) -> Result<(), CommandFailure> {
        self.submitted.lock().unwrap().push(request.clone());
        if self.reject_batch.as_deref() == Some(request.batch_name.as_str()) {
            return Err(CommandFailure::other(&request.batch_name, "rejected"));
        }
        Ok(())
    }
}
