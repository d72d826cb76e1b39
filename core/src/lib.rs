//! Stage-ordered, idempotent command pipeline engine.
//!
//! Commands producing file artifacts are grouped into named stages of a
//! [`TaskSet`](taskset::TaskSet). The [`Pipeline`](engine::Pipeline) skips
//! commands whose declared outputs already exist and hands the remaining work,
//! one stage at a time, to an [`ExecutionBackend`](backend::ExecutionBackend).

pub mod api;
pub mod artifact;
pub mod backend;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod taskset;
