use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use stagerun_core::api::{BatchSystem, CommandFailure, SchedulerAdapter, SubmissionRequest};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Submits job arrays through `qbatch`, which reads one command per line
/// from stdin.
#[derive(Debug, Clone)]
pub struct QbatchAdapter {
    program: String,
    batch_system: BatchSystem,
    timeout: Option<Duration>,
}

impl QbatchAdapter {
    pub fn new(program: impl Into<String>, batch_system: BatchSystem) -> Self {
        Self {
            program: program.into(),
            batch_system,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments after the program name.
    pub fn args(&self, request: &SubmissionRequest) -> Vec<String> {
        let mut args = vec![
            "--batch_system".to_string(),
            self.batch_system.as_str().to_string(),
            "-N".to_string(),
            request.batch_name.clone(),
        ];
        if let Some(prev) = &request.after_ok {
            args.push("--afterok_pattern".to_string());
            args.push(format!("{prev}*"));
        }
        args.push("-".to_string());
        args.push(request.width.to_string());
        args.push(request.walltime.clone());
        args
    }

    fn describe(&self, request: &SubmissionRequest) -> String {
        format!("{} {}", self.program, self.args(request).join(" "))
    }
}

#[async_trait]
impl SchedulerAdapter for QbatchAdapter {
    fn name(&self) -> &str {
        "qbatch"
    }

    async fn submit(&self, request: &SubmissionRequest) -> Result<(), CommandFailure> {
        let described = self.describe(request);
        tracing::debug!(command = %described, jobs = request.commands.len(), "qbatch submit");

        let mut child = Command::new(&self.program)
            .args(self.args(request))
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandFailure::other(&described, format!("failed to start: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            let mut payload = request.commands.join("\n");
            payload.push('\n');
            match stdin.write_all(payload.as_bytes()).await {
                Ok(()) => {}
                // The exit status below tells why it stopped reading.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => {
                    return Err(CommandFailure::other(
                        &described,
                        format!("stdin write failed: {e}"),
                    ));
                }
            }
        }

        let status = match self.timeout {
            None => child.wait().await,
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(CommandFailure::other(
                        &described,
                        format!("submission timed out after {}s", limit.as_secs()),
                    ));
                }
            },
        }
        .map_err(|e| CommandFailure::other(&described, format!("wait failed: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(CommandFailure::exited(described, status.code()))
        }
    }
}
