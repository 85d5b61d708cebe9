//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Runtime helpers supporting the orchestrator."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
//! Periodic task scheduling for the HSUP runtime.

pub mod scheduling;

pub use scheduling::{ScheduledTask, Scheduler};
