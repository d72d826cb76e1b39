//! stagerun-cli library: exposes the CLI modules for unit tests.

pub mod app;
pub mod commands;
pub mod error;
