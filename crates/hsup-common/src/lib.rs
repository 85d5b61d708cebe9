//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Shared primitives and utilities for the supervisor runtime."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
//! Shared primitives for the HSUP workspace.
//! This crate exposes configuration loading, logging, and version metadata
//! utilities consumed by the orchestrator, the management API, and the daemon.

pub mod config;
pub mod logging;
pub mod version;

pub use config::{
    ApiConfig, AppConfig, DockerConfig, HostControlConfig, InstallConfig, LoadedAppConfig,
    LoggingConfig, UpdateConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use version::VersionInfo;
