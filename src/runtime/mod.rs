//! Background supervisors that drive the orchestrator, adapter, and
//! summarizer services on their own cadence.

pub mod adapter_runtime;
pub mod orchestrator_runtime;
pub mod summarizer_runtime;
pub mod supervisor;

pub use adapter_runtime::AdapterRuntime;
pub use orchestrator_runtime::OrchestratorRuntime;
pub use summarizer_runtime::SummarizerRuntime;
pub use supervisor::{Supervisor, SupervisorStatus};
