mod pending;
mod stage;

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::command::Command;
use crate::error::EngineError;

pub use pending::{provision_dirs, PendingStage};
pub use stage::{Stage, StageHints};

/// All stages of a pipeline plus the order they run in.
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    stages: HashMap<String, Stage>,
    stage_order: Vec<String>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `command` under `stage`, creating the stage (at the end of
    /// the stage order) the first time its name is seen.
    pub fn add_command(&mut self, stage: &str, command: Command) {
        self.stage_entry(stage).push(command);
    }

    /// Registers a stage without commands so it keeps its position even if
    /// no generator ends up contributing to it.
    pub fn declare_stage(&mut self, stage: &str) {
        self.stage_entry(stage);
    }

    /// Handle for adding several commands to one stage.
    pub fn stage(&mut self, name: &str) -> StageHandle<'_> {
        StageHandle {
            taskset: self,
            name: name.to_string(),
        }
    }

    pub fn set_hints(&mut self, stage: &str, hints: StageHints) {
        self.stage_entry(stage).set_hints(hints);
    }

    /// Replaces the stage order. Every name must already be registered; the
    /// order may leave registered stages out.
    pub fn set_stage_order<I, S>(&mut self, order: I) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order: Vec<String> = order.into_iter().map(Into::into).collect();
        let unknown: Vec<String> = order
            .iter()
            .filter(|name| !self.stages.contains_key(name.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(EngineError::StageOrder { unknown });
        }

        let mut seen = HashSet::new();
        self.stage_order = order
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect();
        Ok(())
    }

    pub fn stage_order(&self) -> &[String] {
        &self.stage_order
    }

    pub fn get(&self, stage: &str) -> Option<&Stage> {
        self.stages.get(stage)
    }

    pub fn contains(&self, stage: &str) -> bool {
        self.stages.contains_key(stage)
    }

    pub fn is_empty(&self) -> bool {
        self.stages.values().all(Stage::is_empty)
    }

    /// Total number of commands across all stages, duplicates included.
    pub fn command_count(&self) -> usize {
        self.stages.values().map(Stage::len).sum()
    }

    /// Stages to run: the caller's list in the caller's order, or the
    /// registered order when no list is given. Unknown names are rejected
    /// before anything runs.
    pub fn resolve_stages(&self, requested: Option<&[String]>) -> Result<Vec<String>, EngineError> {
        match requested {
            None => Ok(self.stage_order.clone()),
            Some(list) => {
                if let Some(unknown) = list.iter().find(|name| !self.contains(name)) {
                    return Err(EngineError::UnknownStage(unknown.clone()));
                }
                Ok(list.to_vec())
            }
        }
    }

    /// Unfinished, de-duplicated commands of one stage, computed against the
    /// filesystem at call time.
    pub fn pending(&self, stage: &str) -> Result<PendingStage, EngineError> {
        self.stages
            .get(stage)
            .map(PendingStage::from_stage)
            .ok_or_else(|| EngineError::UnknownStage(stage.to_string()))
    }

    /// Pending view of every stage, in stage order.
    pub fn populate(&self) -> Vec<PendingStage> {
        self.stage_order
            .iter()
            .filter_map(|name| self.stages.get(name))
            .map(PendingStage::from_stage)
            .collect()
    }

    fn stage_entry(&mut self, name: &str) -> &mut Stage {
        if !self.stages.contains_key(name) {
            self.stage_order.push(name.to_string());
        }
        self.stages
            .entry(name.to_string())
            .or_insert_with(|| Stage::new(name))
    }
}

impl fmt::Display for TaskSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.stage_order {
            writeln!(f, "{name}:")?;
            if let Some(stage) = self.stages.get(name) {
                for command in stage.commands() {
                    writeln!(f, "\t{command}")?;
                }
            }
        }
        Ok(())
    }
}

pub struct StageHandle<'a> {
    taskset: &'a mut TaskSet,
    name: String,
}

impl StageHandle<'_> {
    pub fn command(&mut self, command: Command) -> &mut Self {
        self.taskset.add_command(&self.name, command);
        self
    }

    pub fn hints(&mut self, hints: StageHints) -> &mut Self {
        self.taskset.set_hints(&self.name, hints);
        self
    }
}
