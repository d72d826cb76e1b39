//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `stagerun_core::api` instead of reaching into internal modules.

pub use crate::artifact::{Artifact, Role};
pub use crate::backend::{
    CommandFailure, ExecutionBackend, SchedulerAdapter, StageOutcome, SubmissionRequest,
};
pub use crate::command::{shell_quote, Command, TemplateValues, Token};
pub use crate::config::{
    load_default, load_from_path, AppConfig, BackendKind, BatchConfig, BatchSystem, LoggingConfig,
    RunConfig, ScriptConfig,
};
pub use crate::engine::{EventFormat, Pipeline, ProgressMonitor, RunOptions, RunReport, StageReport};
pub use crate::error::{BackendError, CommandError, ConfigError, EngineError, PlanError};
pub use crate::input::{PlanCommand, PlanFile};
pub use crate::taskset::{PendingStage, Stage, StageHints, TaskSet};
