use std::path::PathBuf;

use thiserror::Error;

use crate::backend::CommandFailure;

/// Errors that stop a pipeline run.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    #[error("stage order references unregistered stages: {}", .unknown.join(", "))]
    StageOrder { unknown: Vec<String> },

    #[error("stage '{stage}': cannot create directory {}: {source}", .path.display())]
    Provision {
        stage: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stage '{stage}' failed: {}", summarize(.failures))]
    StageFailed {
        stage: String,
        failures: Vec<CommandFailure>,
    },

    #[error("stage '{stage}': backend error: {source}")]
    Backend {
        stage: String,
        #[source]
        source: BackendError,
    },
}

impl EngineError {
    /// Name of the stage the error is attributed to, if any.
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Provision { stage, .. }
            | Self::StageFailed { stage, .. }
            | Self::Backend { stage, .. } => Some(stage),
            Self::UnknownStage(_) | Self::StageOrder { .. } => None,
        }
    }

    /// True for errors detected before anything was executed.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnknownStage(_) | Self::StageOrder { .. })
    }
}

fn summarize(failures: &[CommandFailure]) -> String {
    match failures {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

/// Infrastructure failures inside a backend, as opposed to commands that ran
/// and failed.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("scheduler adapter error: {0}")]
    Adapter(String),
}

impl BackendError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
