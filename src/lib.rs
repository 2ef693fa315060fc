//! RepoMesh: a coordination engine for a fleet of autonomous coding agents.
//!
//! Agents register and heartbeat through [`services::AgentService`], claim
//! tasks through [`services::TaskService`] (which couples each claim to a
//! [`services::LockService`] lease on the task's resource key), and exchange
//! progress through the append-only event log fanned out live by
//! [`services::StreamBroker`]. [`services::OrchestratorEngine`],
//! [`services::AdapterService`], and [`services::Summarizer`] are the three
//! background loops, each driven by a [`runtime::Supervisor`] and wired
//! together once at startup by [`coordinator::Coordinator`].
//!
//! [`mcp::Dispatcher`] exposes the whole surface as JSON-RPC 2.0 tool calls.

pub mod adapters;
pub mod coordinator;
pub mod domain;
pub mod infrastructure;
pub mod mcp;
pub mod runtime;
pub mod services;

pub use coordinator::Coordinator;
pub use domain::errors::{DomainError, DomainResult};
