mod orchestrator;
mod report;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::MonitorOrchestrator;
pub use types::{ComponentState, ShutdownReason, ShutdownTrigger};
