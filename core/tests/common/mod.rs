use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stagerun_core::api::{
    BackendError, Command, CommandFailure, ExecutionBackend, PendingStage, StageOutcome, TaskSet,
};

/// Shared log of what a [`TouchBackend`] was asked to run.
pub type Calls = Arc<Mutex<Vec<(String, Vec<String>)>>>;

/// Backend that "runs" a command by creating its declared outputs. Commands
/// whose program is `false` fail with status 1.
pub struct TouchBackend {
    pub calls: Calls,
}

impl TouchBackend {
    pub fn recording() -> (Self, Calls) {
        let calls = Calls::default();
        (
            Self {
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl ExecutionBackend for TouchBackend {
    fn name(&self) -> &str {
        "touch"
    }

    async fn execute_stage(&mut self, stage: &PendingStage) -> Result<StageOutcome, BackendError> {
        self.calls.lock().unwrap().push((
            stage.name.clone(),
            stage.commands.iter().map(Command::render).collect(),
        ));

        let mut failures = Vec::new();
        for command in &stage.commands {
            if command.program() == "false" {
                failures.push(CommandFailure::exited(command.render(), Some(1)));
                continue;
            }
            for output in command.outputs() {
                std::fs::write(output.path(), b"")
                    .map_err(|e| BackendError::io(output.to_string(), e))?;
            }
        }

        if failures.is_empty() {
            Ok(StageOutcome::Success {
                commands: stage.len(),
            })
        } else {
            Ok(StageOutcome::Failure(failures))
        }
    }
}

/// Two-stage scenario: `prep` produces `out/a.img` and `out/b.img`, `reg`
/// consumes both and produces a transform.
pub fn prep_reg_plan(root: &Path) -> TaskSet {
    let out = root.join("out");
    let mut ts = TaskSet::new();
    ts.stage("prep")
        .command(
            Command::new("resample")
                .input(root.join("in/a.mnc"))
                .output(out.join("a.img")),
        )
        .command(
            Command::new("resample")
                .input(root.join("in/b.mnc"))
                .output(out.join("b.img")),
        );
    ts.add_command(
        "reg",
        Command::new("register")
            .input(out.join("a.img"))
            .input(out.join("b.img"))
            .output(root.join("xfm/a_to_b.xfm")),
    );
    ts
}

pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"").unwrap();
}
