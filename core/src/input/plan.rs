use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::{Command, TemplateValues};
use crate::error::PlanError;
use crate::taskset::{StageHints, TaskSet};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanFile {
    /// Replaces the first-seen order when present.
    #[serde(default)]
    pub stage_order: Option<Vec<String>>,

    #[serde(default)]
    pub stages: HashMap<String, StageHints>,

    #[serde(default, rename = "command")]
    pub commands: Vec<PlanCommand>,
}

/// One `[[command]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCommand {
    pub stage: String,
    pub template: String,
    #[serde(default)]
    pub values: HashMap<String, String>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl PlanCommand {
    pub fn build(&self) -> Result<Command, crate::error::CommandError> {
        let values = TemplateValues::new()
            .positional(self.args.iter().cloned())
            .with_named(self.values.clone());
        Command::from_template(&self.template, &values)
    }
}

impl PlanFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw, &path.display().to_string())
    }

    /// `origin` only labels parse errors.
    pub fn parse(raw: &str, origin: &str) -> Result<Self, PlanError> {
        toml::from_str(raw).map_err(|source| PlanError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn into_taskset(self) -> Result<TaskSet, PlanError> {
        let mut taskset = TaskSet::new();

        for (index, entry) in self.commands.iter().enumerate() {
            let command = entry.build().map_err(|source| PlanError::Command {
                index,
                stage: entry.stage.clone(),
                source,
            })?;
            taskset.add_command(&entry.stage, command);
        }

        for (stage, hints) in self.stages {
            if taskset.contains(&stage) {
                taskset.set_hints(&stage, hints);
            } else {
                tracing::warn!(stage = %stage, "hints given for a stage with no commands, ignoring");
            }
        }

        if let Some(order) = self.stage_order {
            taskset.set_stage_order(order)?;
        }

        tracing::debug!(
            stages = taskset.stage_order().len(),
            commands = taskset.command_count(),
            "plan loaded"
        );
        Ok(taskset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CommandError, EngineError};
    use pretty_assertions::assert_eq;

    const PLAN: &str = r#"
stage_order = ["reg", "prep"]

[stages.reg]
walltime = "4:00:00"
processors = 4

[[command]]
stage = "prep"
template = "nu_correct {src!i} {dst!o}"
values = { src = "in/a.mnc", dst = "out/a.mnc" }

[[command]]
stage = "reg"
template = "bestlinreg {} {} {out!o}"
args = ["out/a.mnc", "atlas.mnc"]
values = { out = "out/a.xfm" }
"#;

    #[test]
    fn plan_builds_taskset() {
        let ts = PlanFile::parse(PLAN, "plan.toml").unwrap().into_taskset().unwrap();

        assert_eq!(ts.stage_order(), ["reg", "prep"]);
        let reg = ts.get("reg").unwrap();
        assert_eq!(reg.hints().processors, Some(4));
        assert_eq!(reg.commands()[0].outputs().count(), 1);
        assert_eq!(ts.command_count(), 2);
    }

    #[test]
    fn template_errors_carry_entry_index() {
        let raw = r#"
[[command]]
stage = "prep"
template = "true"

[[command]]
stage = "prep"
template = "cp {missing} x"
"#;
        let err = PlanFile::parse(raw, "p").unwrap().into_taskset().unwrap_err();
        assert!(matches!(
            err,
            PlanError::Command { index: 1, source: CommandError::UnknownPlaceholder(_), .. }
        ));
    }

    #[test]
    fn stage_order_must_name_known_stages() {
        let raw = r#"
stage_order = ["prep", "vote"]

[[command]]
stage = "prep"
template = "true"
"#;
        let err = PlanFile::parse(raw, "p").unwrap().into_taskset().unwrap_err();
        assert!(matches!(err, PlanError::Engine(EngineError::StageOrder { .. })));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PlanFile::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, PlanError::Io { .. }));

        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[[command]\n").unwrap();
        assert!(matches!(PlanFile::load(&path), Err(PlanError::Parse { .. })));
    }
}
