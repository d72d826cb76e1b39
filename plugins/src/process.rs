use std::process::Stdio;
use std::time::Duration;

use stagerun_core::api::{Command, CommandFailure};
use tokio::process::Command as Process;

/// Runs `command` with its tokens as argv (no shell) and waits for it.
///
/// Output is inherited so tool logs reach the terminal. A spawn error or an
/// expired `timeout` is reported as a failure without an exit code; a timed
/// out child is killed first.
pub async fn run_command(command: &Command, timeout: Option<Duration>) -> Result<(), CommandFailure> {
    let argv = command.argv();
    let rendered = command.render();
    let Some((program, args)) = argv.split_first() else {
        return Err(CommandFailure::other(rendered, "empty command"));
    };

    let mut child = Process::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CommandFailure::other(&rendered, format!("failed to start: {e}")))?;

    let status = match timeout {
        None => child.wait().await,
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                let _ = child.kill().await;
                return Err(CommandFailure::other(
                    &rendered,
                    format!("timed out after {}s", limit.as_secs()),
                ));
            }
        },
    }
    .map_err(|e| CommandFailure::other(&rendered, format!("wait failed: {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(CommandFailure::exited(rendered, status.code()))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_exit_status() {
        let ok = Command::new("true");
        assert!(run_command(&ok, None).await.is_ok());

        let bad = Command::new("sh").arg("-c").arg("exit 3");
        let failure = run_command(&bad, None).await.unwrap_err();
        assert_eq!(failure.exit_code, Some(3));
    }

    #[tokio::test]
    async fn arguments_are_not_shell_interpreted() {
        let dir = tempfile::tempdir().unwrap();
        let odd = dir.path().join("a b;c");
        let cmd = Command::new("touch").output(&odd);
        run_command(&cmd, None).await.unwrap();
        assert!(odd.is_file());
    }

    #[tokio::test]
    async fn missing_program_has_no_exit_code() {
        let cmd = Command::new("stagerun-definitely-not-installed");
        let failure = run_command(&cmd, None).await.unwrap_err();
        assert_eq!(failure.exit_code, None);
        assert!(failure.message.starts_with("failed to start"));
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let cmd = Command::new("sleep").arg("5");
        let failure = run_command(&cmd, Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert_eq!(failure.exit_code, None);
        assert!(failure.message.contains("timed out"));
    }
}
