use thiserror::Error;

use super::EngineError;

/// Errors raised while building a command from a template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("command is empty")]
    Empty,

    #[error("unterminated quote in template: {0}")]
    UnterminatedQuote(String),

    #[error("no value for placeholder {0}")]
    UnknownPlaceholder(String),

    #[error("unknown marker '!{marker}' in {placeholder} (expected !o or !i)")]
    UnknownMarker { placeholder: String, marker: String },

    #[error("artifact placeholder must be a whole argument: {0}")]
    EmbeddedArtifact(String),
}

/// Errors raised while loading a plan file into a task set.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("failed to read plan {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid plan {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("plan command #{index} (stage '{stage}'): {source}")]
    Command {
        index: usize,
        stage: String,
        #[source]
        source: CommandError,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}
