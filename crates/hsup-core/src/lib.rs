//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Primary orchestration and lifecycle management."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
//! Core orchestrator for the HSUP host supervisor: ordered startup, first-run
//! installation retries, periodic update checks, and coordinated shutdown.
//!
//! The orchestrator only talks to its collaborators through the traits in
//! [`collaborators`]. Default implementations backed by the docker CLI, the
//! host-control socket, a JSON state file, and a shared HTTP client live in
//! [`docker`], [`host_control`], [`system`], and [`session`].

pub mod collaborators;
pub mod docker;
pub mod error;
pub mod host_control;
pub mod orchestrator;
pub mod retry;
pub mod session;
pub mod system;

pub use collaborators::{
    ApplicationContainer, ConfigStore, HostControl, HostInfo, ManagementApi, SharedSession,
    SupervisorContainer, TaskScheduler,
};
pub use error::OrchestratorError;
pub use orchestrator::{
    CancelHandle, Orchestrator, OrchestratorSettings, OrchestratorState, StartupStage,
};
pub use retry::RetryPolicy;
