use stagerun_core::api::{ConfigError, EngineError, PlanError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("{0}")]
    Engine(#[from] EngineError),
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Anyhow(anyhow::Error),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

/// Config errors carried through `anyhow` keep their own exit code.
impl From<anyhow::Error> for CliError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<ConfigError>() {
            Ok(cfg) => cfg.into(),
            Err(other) => CliError::Anyhow(other),
        }
    }
}

impl CliError {
    /// Process exit code.
    ///
    /// 0: success
    /// 11: config or plan error
    /// 20: backend / IO error
    /// 30: a stage failed
    /// 50: internal/uncategorized
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Plan(_) => 11,
            CliError::Engine(e) => match e {
                EngineError::UnknownStage(_) | EngineError::StageOrder { .. } => 11,
                EngineError::StageFailed { .. } => 30,
                EngineError::Provision { .. } | EngineError::Backend { .. } => 20,
            },
            CliError::Logging(_) | CliError::Io(_) => 20,
            CliError::Anyhow(_) => 50,
        }
    }
}
