use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::taskset::StageHints;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub script: ScriptConfig,

    /// Per-stage scheduler hints, keyed by stage name.
    #[serde(default)]
    pub stages: HashMap<String, StageHints>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.jobs == Some(0) {
            return Err(ConfigError::Invalid("run.jobs must be at least 1".into()));
        }
        if self.run.command_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "run.command_timeout_secs must be at least 1".into(),
            ));
        }
        if self.batch.program.trim().is_empty() {
            return Err(ConfigError::Invalid("batch.program is empty".into()));
        }
        if self.script.width == Some(0) {
            return Err(ConfigError::Invalid("script.width must be at least 1".into()));
        }
        if self.script.path.trim().is_empty() {
            return Err(ConfigError::Invalid("script.path is empty".into()));
        }
        for (name, hints) in &self.stages {
            if hints.processors == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "stages.{name}.processors must be at least 1"
                )));
            }
        }
        Ok(())
    }

    /// Worker width for parallel execution and script batches.
    pub fn jobs(&self) -> usize {
        self.run.jobs.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "stagerun_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sequential,
    Parallel,
    Batch,
    Script,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Sequential => "sequential",
            BackendKind::Parallel => "parallel",
            BackendKind::Batch => "batch",
            BackendKind::Script => "script",
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(BackendKind::Sequential),
            "parallel" => Ok(BackendKind::Parallel),
            "batch" => Ok(BackendKind::Batch),
            "script" => Ok(BackendKind::Script),
            other => Err(ConfigError::Invalid(format!("unknown backend '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Worker width; defaults to the number of CPUs.
    #[serde(default)]
    pub jobs: Option<usize>,

    #[serde(default)]
    pub dry_run: bool,

    /// Per-command limit for local execution.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,

    /// "text" or "jsonl"
    #[serde(default = "default_event_format")]
    pub event_format: String,

    #[serde(default)]
    pub progress_bar: bool,
}

fn default_event_format() -> String {
    "text".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            jobs: None,
            dry_run: false,
            command_timeout_secs: None,
            event_format: default_event_format(),
            progress_bar: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchSystem {
    #[default]
    Pbs,
    Sge,
}

impl BatchSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchSystem::Pbs => "pbs",
            BatchSystem::Sge => "sge",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Submission program fed one command per line on stdin.
    #[serde(default = "default_batch_program")]
    pub program: String,

    #[serde(default)]
    pub batch_system: BatchSystem,

    #[serde(default = "default_walltime")]
    pub default_walltime: String,

    /// Prepended to every batch name, e.g. a project tag.
    #[serde(default)]
    pub name_prefix: Option<String>,

    #[serde(default)]
    pub submit_timeout_secs: Option<u64>,
}

fn default_batch_program() -> String {
    "qbatch".to_string()
}

fn default_walltime() -> String {
    "10:00:00".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            program: default_batch_program(),
            batch_system: BatchSystem::default(),
            default_walltime: default_walltime(),
            name_prefix: None,
            submit_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Combined script written after the last stage.
    #[serde(default = "default_script_path")]
    pub path: String,

    /// Where per-stage fragments go; next to `path` when unset.
    #[serde(default)]
    pub fragment_dir: Option<String>,

    /// Commands per concurrent batch; falls back to `run.jobs`.
    #[serde(default)]
    pub width: Option<usize>,
}

fn default_script_path() -> String {
    "pipeline.sh".to_string()
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            path: default_script_path(),
            fragment_dir: None,
            width: None,
        }
    }
}
