use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use crate::command::Command;

use super::stage::{Stage, StageHints};

/// The work left in one stage: unfinished commands, de-duplicated by their
/// argv, plus the directories their outputs need.
#[derive(Debug, Clone)]
pub struct PendingStage {
    pub name: String,
    pub commands: Vec<Command>,
    pub output_dirs: Vec<PathBuf>,
    pub hints: StageHints,
    /// Commands skipped because all their outputs already exist.
    pub finished: usize,
    /// Unfinished commands dropped because an identical argv came earlier.
    pub duplicates: usize,
}

impl PendingStage {
    /// Partitions `stage` against the filesystem as it is right now.
    pub fn from_stage(stage: &Stage) -> Self {
        let mut seen = HashSet::new();
        let mut dir_seen = HashSet::new();
        let mut commands = Vec::new();
        let mut output_dirs = Vec::new();
        let mut finished = 0;
        let mut duplicates = 0;

        for command in stage.commands() {
            if command.is_satisfied() {
                finished += 1;
                continue;
            }
            if !seen.insert(command.argv()) {
                duplicates += 1;
                continue;
            }
            for dir in command.outputs().filter_map(|a| a.parent()) {
                if dir_seen.insert(dir.to_path_buf()) {
                    output_dirs.push(dir.to_path_buf());
                }
            }
            commands.push(command.clone());
        }

        Self {
            name: stage.name().to_string(),
            commands,
            output_dirs,
            hints: stage.hints().clone(),
            finished,
            duplicates,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

/// Creates every directory (and missing parents). A directory that already
/// exists, including one created concurrently, is not an error.
pub fn provision_dirs(dirs: &[PathBuf]) -> Result<(), (PathBuf, io::Error)> {
    for dir in dirs {
        create_dir_idempotent(dir).map_err(|e| (dir.clone(), e))?;
    }
    Ok(())
}

fn create_dir_idempotent(dir: &Path) -> io::Result<()> {
    match std::fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioning_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        provision_dirs(&[nested.clone(), nested.clone()]).unwrap();
        provision_dirs(&[nested.clone()]).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn provisioning_over_a_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let (path, _err) = provision_dirs(&[blocker.join("child")]).unwrap_err();
        assert_eq!(path, blocker.join("child"));
    }
}
