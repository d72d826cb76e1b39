//! Plan files: TOML descriptions of commands, stage hints, and stage order.

mod plan;

pub use plan::{PlanCommand, PlanFile};
