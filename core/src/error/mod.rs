pub mod command;
pub mod config;
pub mod engine;

pub use command::{CommandError, PlanError};
pub use config::ConfigError;
pub use engine::{BackendError, EngineError};
