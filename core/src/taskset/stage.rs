use serde::{Deserialize, Serialize};

use crate::command::Command;

/// Resource hints passed verbatim to a batch scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageHints {
    /// Wall-clock limit in the scheduler's own format, e.g. `"4:00:00"`.
    #[serde(default)]
    pub walltime: Option<String>,

    #[serde(default)]
    pub processors: Option<usize>,
}

impl StageHints {
    /// Fills unset fields from `other`.
    pub fn or(self, other: &StageHints) -> StageHints {
        StageHints {
            walltime: self.walltime.or_else(|| other.walltime.clone()),
            processors: self.processors.or(other.processors),
        }
    }
}

/// A named group of independent commands.
#[derive(Debug, Clone)]
pub struct Stage {
    name: String,
    commands: Vec<Command>,
    hints: StageHints,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
            hints: StageHints::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn hints(&self) -> &StageHints {
        &self.hints
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub(crate) fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub(crate) fn set_hints(&mut self, hints: StageHints) {
        self.hints = hints;
    }
}
