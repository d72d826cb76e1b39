//! CLI assembly: merge command-line overrides into the config, load the plan,
//! build the backend, and run or describe the pipeline.
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use stagerun_core::api as core_api;
use stagerun_plugins::factory;

use crate::commands::cli::{Args, BackendArg, EventsArg, RunArgs, ShowArgs};
use crate::error::CliError;

/// Explicit `--config` wins over the default search path.
pub fn load_config(args: &Args) -> Result<core_api::AppConfig, CliError> {
    let mut cfg = match &args.config {
        Some(path) => core_api::load_from_path(path)?,
        None => core_api::load_default()?,
    };
    if let Some(level) = &args.log_level {
        cfg.logging.level = level.clone();
    }
    Ok(cfg)
}

pub fn apply_run_overrides(
    cfg: &mut core_api::AppConfig,
    ra: &RunArgs,
) -> Result<(), CliError> {
    if let Some(backend) = ra.backend {
        cfg.run.backend = match backend {
            BackendArg::Sequential => core_api::BackendKind::Sequential,
            BackendArg::Parallel => core_api::BackendKind::Parallel,
            BackendArg::Batch => core_api::BackendKind::Batch,
            BackendArg::Script => core_api::BackendKind::Script,
        };
    }
    if let Some(jobs) = ra.jobs {
        cfg.run.jobs = Some(jobs);
    }
    if ra.dry_run {
        cfg.run.dry_run = true;
    }
    if let Some(secs) = ra.timeout_secs {
        cfg.run.command_timeout_secs = Some(secs);
    }
    if let Some(events) = ra.events {
        cfg.run.event_format = match events {
            EventsArg::Text => "text".to_string(),
            EventsArg::Jsonl => "jsonl".to_string(),
        };
    }
    if let Some(script) = &ra.script {
        cfg.script.path = script.clone();
    }
    if ra.progress {
        cfg.run.progress_bar = true;
    }
    cfg.validate()?;
    Ok(())
}

/// Loads the plan and layers config hints under the plan's own hints.
pub fn load_taskset(
    path: &Path,
    cfg: &core_api::AppConfig,
) -> Result<core_api::TaskSet, CliError> {
    let mut taskset = core_api::PlanFile::load(path)?.into_taskset()?;
    for (stage, hints) in &cfg.stages {
        if let Some(existing) = taskset.get(stage) {
            let merged = existing.hints().clone().or(hints);
            taskset.set_hints(stage, merged);
        }
    }
    Ok(taskset)
}

#[tracing::instrument(name = "cli.run", skip(cfg, ra), fields(plan = %ra.plan.display()))]
pub async fn run(mut cfg: core_api::AppConfig, ra: RunArgs) -> Result<i32, CliError> {
    apply_run_overrides(&mut cfg, &ra)?;
    let taskset = load_taskset(&ra.plan, &cfg)?;

    let mut opts = core_api::RunOptions::from_config(&cfg.run)?;
    opts.quiet = ra.quiet;
    opts.verbose = ra.verbose;

    let mut backend = factory::build_backend(&cfg);
    tracing::debug!(backend = backend.name(), jobs = cfg.jobs(), "backend ready");

    let stages = (!ra.stages.is_empty()).then_some(ra.stages.as_slice());
    core_api::Pipeline::new(&taskset, &opts)
        .run(backend.as_mut(), stages)
        .await?;
    Ok(0)
}

pub fn show(cfg: &core_api::AppConfig, sa: &ShowArgs) -> Result<i32, CliError> {
    let taskset = load_taskset(&sa.plan, cfg)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(describe(&taskset).as_bytes())?;
    stdout.flush()?;
    Ok(0)
}

/// Stage-by-stage listing with the work left in each.
pub fn describe(taskset: &core_api::TaskSet) -> String {
    let mut out = String::new();
    for pending in taskset.populate() {
        let _ = writeln!(
            out,
            "{}: {} pending, {} finished, {} duplicate",
            pending.name,
            pending.len(),
            pending.finished,
            pending.duplicates
        );
        if let Some(stage) = taskset.get(&pending.name) {
            for command in stage.commands() {
                let mark = if command.is_satisfied() { "done" } else { "todo" };
                let _ = writeln!(out, "\t[{mark}] {command}");
            }
        }
    }
    out
}
