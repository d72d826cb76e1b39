use chrono::Local;
use serde::Serialize;

use crate::backend::StageOutcome;
use crate::taskset::PendingStage;

use super::{EventFormat, RunOptions, RunReport};

/// One line of `jsonl` output.
#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    pub v: i32,
    #[serde(rename = "type")]
    pub event_type: String,
    pub ts: String,
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl RunEvent {
    fn new(event_type: &str, run_id: &str, stage: Option<&str>, metadata: serde_json::Value) -> Self {
        Self {
            v: 1,
            event_type: event_type.to_string(),
            ts: Local::now().to_rfc3339(),
            run_id: run_id.to_string(),
            stage: stage.map(str::to_string),
            metadata: Some(metadata),
        }
    }
}

fn emit_json(ev: &RunEvent) {
    if let Ok(line) = serde_json::to_string(ev) {
        println!("{line}");
    }
}

/// Emit run start event
pub fn emit_run_start(opts: &RunOptions, run_id: &str, backend: &str, stages: &[String]) {
    match opts.event_format {
        EventFormat::Jsonl => emit_json(&RunEvent::new(
            "run.start",
            run_id,
            None,
            serde_json::json!({
                "backend": backend,
                "dry_run": opts.dry_run,
                "total_stages": stages.len(),
            }),
        )),
        EventFormat::Text if !opts.quiet => {
            let mode = if opts.dry_run { " (dry run)" } else { "" };
            println!("Starting {} stages on {backend}{mode}", stages.len());
        }
        _ => {}
    }
}

/// Emit execution plan (JSONL only, or text when verbose)
pub fn emit_execution_plan(opts: &RunOptions, run_id: &str, stages: &[String]) {
    match opts.event_format {
        EventFormat::Jsonl => emit_json(&RunEvent::new(
            "executor.plan",
            run_id,
            None,
            serde_json::json!({ "stages": stages }),
        )),
        EventFormat::Text if opts.verbose && !opts.quiet => {
            println!("Execution plan:");
            for (i, stage) in stages.iter().enumerate() {
                println!("  {}. {}", i + 1, stage);
            }
        }
        _ => {}
    }
}

/// Emit stage start event
pub fn emit_stage_start(opts: &RunOptions, run_id: &str, index: usize, pending: &PendingStage) {
    match opts.event_format {
        EventFormat::Jsonl => emit_json(&RunEvent::new(
            "stage.start",
            run_id,
            Some(&pending.name),
            serde_json::json!({
                "index": index,
                "pending": pending.len(),
                "finished": pending.finished,
                "duplicates": pending.duplicates,
            }),
        )),
        EventFormat::Text if !opts.quiet => {
            println!(
                "== STAGE {} ({} pending, {} already done)",
                pending.name,
                pending.len(),
                pending.finished
            );
        }
        _ => {}
    }
}

/// Emit stage end event
pub fn emit_stage_end(
    opts: &RunOptions,
    run_id: &str,
    stage: &str,
    outcome: &StageOutcome,
    duration_ms: u64,
) {
    match opts.event_format {
        EventFormat::Jsonl => {
            let failures: Vec<_> = match outcome {
                StageOutcome::Failure(f) => f
                    .iter()
                    .map(|f| serde_json::json!({ "command": f.command, "exit_code": f.exit_code, "message": f.message }))
                    .collect(),
                _ => Vec::new(),
            };
            emit_json(&RunEvent::new(
                "stage.end",
                run_id,
                Some(stage),
                serde_json::json!({
                    "outcome": outcome.label(),
                    "duration_ms": duration_ms,
                    "failures": failures,
                }),
            ));
        }
        EventFormat::Text if opts.verbose && !opts.quiet => {
            println!("   {stage}: {} in {duration_ms}ms", outcome.label());
        }
        _ => {}
    }
}

/// Emit run end event
pub fn emit_run_end(opts: &RunOptions, run_id: &str, report: &RunReport) {
    match opts.event_format {
        EventFormat::Jsonl => emit_json(&RunEvent::new(
            "run.end",
            run_id,
            None,
            serde_json::json!({
                "stages": report.stages.len(),
                "commands": report.commands_run(),
                "skipped_stages": report.skipped_stages(),
                "duration_ms": report.duration_ms,
            }),
        )),
        EventFormat::Text if !opts.quiet => {
            println!(
                "Done: {} commands across {} stages in {}ms",
                report.commands_run(),
                report.stages.len(),
                report.duration_ms
            );
        }
        _ => {}
    }
}
