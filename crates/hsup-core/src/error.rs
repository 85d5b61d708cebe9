//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Primary orchestration and lifecycle management."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
use thiserror::Error;

/// Conditions that abort the startup sequence.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("orchestrator already started")]
    AlreadyStarted,
    #[error("failed to attach supervisor container: {0:#}")]
    Attach(anyhow::Error),
    #[error("failed to register {view} api view: {error:#}")]
    ApiRegistration {
        view: &'static str,
        error: anyhow::Error,
    },
    #[error("failed to start management api: {0:#}")]
    ApiStart(anyhow::Error),
    #[error("application install gave up after {attempts} attempts")]
    InstallExhausted { attempts: u32 },
    #[error("application container stopped with error: {0:#}")]
    Application(anyhow::Error),
}
