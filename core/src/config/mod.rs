mod load;
mod types;

pub use load::{get_stagerun_data_dir, load_default, load_from_path};
pub use types::{
    AppConfig, BackendKind, BatchConfig, BatchSystem, LoggingConfig, RunConfig, ScriptConfig,
};
