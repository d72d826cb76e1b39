use std::time::Duration;

use stagerun_core::api::{AppConfig, BackendKind, ExecutionBackend, SchedulerAdapter};

use crate::backend::{BatchQueueBackend, ParallelBackend, ScriptEmitterBackend, SequentialBackend};
use crate::scheduler::QbatchAdapter;

pub fn build_scheduler(cfg: &AppConfig) -> Box<dyn SchedulerAdapter> {
    Box::new(
        QbatchAdapter::new(cfg.batch.program.clone(), cfg.batch.batch_system)
            .with_timeout(cfg.batch.submit_timeout_secs.map(Duration::from_secs)),
    )
}

pub fn build_backend(cfg: &AppConfig) -> Box<dyn ExecutionBackend> {
    let timeout = cfg.run.command_timeout_secs.map(Duration::from_secs);

    match cfg.run.backend {
        BackendKind::Sequential => Box::new(SequentialBackend::new(timeout)),
        BackendKind::Parallel => Box::new(
            ParallelBackend::new(cfg.jobs(), timeout).with_progress(cfg.run.progress_bar),
        ),
        BackendKind::Batch => {
            let backend = BatchQueueBackend::new(
                build_scheduler(cfg),
                cfg.jobs(),
                cfg.batch.default_walltime.clone(),
            );
            match &cfg.batch.name_prefix {
                Some(prefix) => Box::new(backend.with_name_prefix(prefix.clone())),
                None => Box::new(backend),
            }
        }
        BackendKind::Script => {
            let width = cfg.script.width.unwrap_or_else(|| cfg.jobs());
            let backend = ScriptEmitterBackend::new(&cfg.script.path, width);
            match &cfg.script.fragment_dir {
                Some(dir) => Box::new(backend.with_fragment_dir(dir)),
                None => Box::new(backend),
            }
        }
    }
}
