//! Execution backends: how a filtered stage becomes processes, a scheduler
//! submission, or shell script text.

mod batch;
mod parallel;
mod script;
mod sequential;

pub use batch::BatchQueueBackend;
pub use parallel::ParallelBackend;
pub use script::ScriptEmitterBackend;
pub use sequential::SequentialBackend;
