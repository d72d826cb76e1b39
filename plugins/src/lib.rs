pub mod backend;
pub mod factory;
pub mod process;
pub mod scheduler;
