//! Task implementations the scheduler can run

pub mod burst_task;
pub mod script_task;

pub use burst_task::BurstTask;
pub use script_task::ScriptTask;
