//! Cell process execution: the launcher primitive and the orchestrator.

pub mod orchestrator;
pub mod spawner;

pub use orchestrator::Orchestrator;
pub use spawner::{launch, LaunchSpec, LaunchedProcess, ProcessEvent};
