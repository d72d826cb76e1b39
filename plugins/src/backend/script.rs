use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Local;
use stagerun_core::api::{shell_quote, BackendError, ExecutionBackend, PendingStage, StageOutcome};

const BARRIER_FN: &str = r#"barrier() {
    failed=0
    for pid in "$@"; do
        wait "$pid" || failed=1
    done
    if [ "$failed" -ne 0 ]; then
        echo "stagerun: a command in this batch failed, aborting" >&2
        exit 1
    fi
}
"#;

/// Writes the pipeline out as POSIX shell instead of running it.
///
/// Each stage becomes a fragment `{counter:02}_{stage}.sh` in the fragment
/// directory; `finish` concatenates every section into one executable script.
/// Nothing is executed and no output directory is created here, the script
/// does that itself.
pub struct ScriptEmitterBackend {
    script_path: PathBuf,
    fragment_dir: PathBuf,
    width: usize,
    counter: usize,
    sections: Vec<String>,
}

impl ScriptEmitterBackend {
    pub fn new(script_path: impl Into<PathBuf>, width: usize) -> Self {
        let script_path = script_path.into();
        let fragment_dir = script_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            script_path,
            fragment_dir,
            width,
            counter: 0,
            sections: Vec::new(),
        }
    }

    pub fn with_fragment_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fragment_dir = dir.into();
        self
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn fragment_path(&self, counter: usize, stage: &str) -> PathBuf {
        self.fragment_dir
            .join(format!("{counter:02}_{}.sh", sanitize(stage)))
    }

    fn render_section(&self, stage: &PendingStage) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "\necho {}",
            shell_quote(&format!(
                "== STAGE {} ({}): {} commands",
                self.counter,
                stage.name,
                stage.len()
            ))
        );

        if !stage.output_dirs.is_empty() {
            for dir in &stage.output_dirs {
                let _ = writeln!(out, "mkdir -p {}", shell_quote(&dir.display().to_string()));
            }
        }

        if self.width <= 1 {
            for command in &stage.commands {
                let _ = writeln!(out, "{}", command.shell_line());
            }
            return out;
        }

        for batch in stage.commands.chunks(self.width) {
            out.push_str("pids=\"\"\n");
            for command in batch {
                let _ = writeln!(out, "{} &", command.shell_line());
                out.push_str("pids=\"$pids $!\"\n");
            }
            out.push_str("barrier $pids\n");
        }
        out
    }

    /// Removes fragments left by an earlier run so only this run's stages
    /// remain in the fragment directory.
    async fn clear_fragments(&self) -> Result<(), BackendError> {
        let mut entries = match tokio::fs::read_dir(&self.fragment_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(BackendError::io(
                    format!("read {}", self.fragment_dir.display()),
                    e,
                ))
            }
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BackendError::io(format!("read {}", self.fragment_dir.display()), e))?
        {
            let path = entry.path();
            let stale = entry.file_name().to_str().is_some_and(is_fragment_name)
                && path != self.script_path
                && path.is_file();
            if stale {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| BackendError::io(format!("remove {}", path.display()), e))?;
                tracing::debug!(fragment = %path.display(), "removed stale fragment");
            }
        }
        Ok(())
    }

    fn header(&self) -> String {
        let mut out = String::from("#!/bin/sh\nset -e\n\n");
        let _ = writeln!(
            out,
            "echo {}",
            shell_quote(&format!(
                "This script was generated by stagerun on {}",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            ))
        );
        out.push('\n');
        out.push_str(BARRIER_FN);
        out
    }
}

fn sanitize(stage: &str) -> String {
    stage
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "-_.".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `{nn}_{stage}.sh`, as written by [`ScriptEmitterBackend::fragment_path`].
fn is_fragment_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() > 6
        && bytes[0].is_ascii_digit()
        && bytes[1].is_ascii_digit()
        && bytes[2] == b'_'
        && name.ends_with(".sh")
}

async fn write_file(path: &Path, contents: &str) -> Result<(), BackendError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BackendError::io(format!("create {}", parent.display()), e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| BackendError::io(format!("write {}", path.display()), e))
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<(), BackendError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| BackendError::io(format!("chmod {}", path.display()), e))
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<(), BackendError> {
    Ok(())
}

#[async_trait]
impl ExecutionBackend for ScriptEmitterBackend {
    fn name(&self) -> &str {
        "script"
    }

    fn provisions_locally(&self) -> bool {
        false
    }

    async fn execute_stage(&mut self, stage: &PendingStage) -> Result<StageOutcome, BackendError> {
        if self.counter == 0 {
            self.clear_fragments().await?;
        }
        self.counter += 1;
        let section = self.render_section(stage);

        let fragment = self.fragment_path(self.counter, &stage.name);
        let mut standalone = self.header();
        standalone.push_str(&section);
        write_file(&fragment, &standalone).await?;
        tracing::info!(stage = %stage.name, fragment = %fragment.display(), "wrote stage fragment");

        self.sections.push(section);
        Ok(StageOutcome::Success {
            commands: stage.len(),
        })
    }

    async fn finish(&mut self) -> Result<(), BackendError> {
        let mut script = self.header();
        for section in &self.sections {
            script.push_str(section);
        }
        script.push_str("\necho \"== DONE\"\n");

        write_file(&self.script_path, &script).await?;
        make_executable(&self.script_path).await?;
        tracing::info!(
            script = %self.script_path.display(),
            stages = self.sections.len(),
            "wrote pipeline script"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stagerun_core::api::{Command, TaskSet};

    fn pending(root: &Path, n: usize) -> PendingStage {
        let mut ts = TaskSet::new();
        for i in 0..n {
            ts.add_command("blur", Command::new("touch").output(root.join(format!("out/{i}.mnc"))));
        }
        ts.pending("blur").unwrap()
    }

    #[test]
    fn batches_end_with_barrier() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptEmitterBackend::new(dir.path().join("run.sh"), 2);
        let section = backend.render_section(&pending(dir.path(), 3));

        assert_eq!(section.matches("barrier $pids").count(), 2);
        assert_eq!(section.matches(" &\n").count(), 3);
        assert_eq!(section.matches("mkdir -p").count(), 1);
    }

    #[test]
    fn width_one_is_serial() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptEmitterBackend::new(dir.path().join("run.sh"), 1);
        let section = backend.render_section(&pending(dir.path(), 2));

        assert!(!section.contains("barrier"));
        assert!(!section.contains(" &\n"));
    }

    #[test]
    fn fragment_names_are_numbered() {
        let backend = ScriptEmitterBackend::new("/tmp/x/run.sh", 4).with_fragment_dir("/tmp/frag");
        assert_eq!(
            backend.fragment_path(3, "pairwise reg"),
            PathBuf::from("/tmp/frag/03_pairwise_reg.sh")
        );
    }

    #[test]
    fn recognizes_fragment_names() {
        assert!(is_fragment_name("03_vote.sh"));
        assert!(!is_fragment_name("pipeline.sh"));
        assert!(!is_fragment_name("3_vote.sh"));
        assert!(!is_fragment_name("03_vote.log"));
    }
}
