//! Command implementations.

mod plan;
mod processors;
mod run;
mod validate;

pub use plan::run_plan;
pub use processors::run_processors;
pub use run::run_dispatch;
pub use validate::run_validate;
