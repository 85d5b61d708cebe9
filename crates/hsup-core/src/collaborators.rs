//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Primary orchestration and lifecycle management."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
//! Interfaces the orchestrator drives. Implementations own their transport and
//! persistence details; the orchestrator only sequences the calls.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use hsup_rt::{ScheduledTask, Scheduler};
use serde::{Deserialize, Serialize};

/// Host description reported by the host-control channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub os: String,
    pub version: String,
    pub hostname: String,
    /// Feature level supported by the host-control daemon.
    pub level: i64,
}

/// The self-update supervisor container this process runs in.
#[async_trait]
pub trait SupervisorContainer: Send + Sync {
    /// Resolve the running supervisor's image and version. Failure is fatal.
    async fn attach(&self) -> Result<()>;

    /// Image attached by [`SupervisorContainer::attach`].
    fn image(&self) -> Option<String>;

    /// Version attached by [`SupervisorContainer::attach`].
    fn version(&self) -> Option<String>;
}

/// The managed home automation application container.
#[async_trait]
pub trait ApplicationContainer: Send + Sync {
    /// Install the image for `tag`. `Ok(false)` reports a failed install.
    async fn install(&self, tag: &str) -> Result<bool>;

    /// Run the application. Resolves only once the service stops.
    async fn run(&self) -> Result<()>;

    /// Repository name of the application image, without a tag.
    fn image(&self) -> String;
}

/// Privileged host-level command channel, optional on a given host.
#[async_trait]
pub trait HostControl: Send + Sync {
    /// `None` when the channel is missing or unreachable.
    async fn info(&self) -> Option<HostInfo>;
}

/// Management API lifecycle and view registration.
///
/// Every `register_*` hook is called exactly once and before [`ManagementApi::start`].
#[async_trait]
pub trait ManagementApi: Send + Sync {
    fn register_host(&self, host: Arc<dyn HostControl>) -> Result<()>;

    fn register_supervisor(&self, supervisor: Arc<dyn SupervisorContainer>) -> Result<()>;

    fn register_homeassistant(&self, homeassistant: Arc<dyn ApplicationContainer>) -> Result<()>;

    async fn start(&self) -> Result<()>;

    async fn stop(&self);
}

/// Periodic task registration contract.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    fn register_task(&self, task: ScheduledTask, interval: Duration, first_run: bool);

    /// Release the scheduler; registered tasks stop running.
    async fn shutdown(&self);
}

/// System configuration holding the installed and latest known application tags.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Refresh the latest known tags from the update feed.
    ///
    /// Returns `false` when nothing could be fetched. Never fails loudly.
    async fn fetch_update_infos(&self) -> bool;

    /// Latest application tag advertised by the update feed.
    fn latest_homeassistant(&self) -> Option<String>;

    /// Tag of the application image that is installed and running.
    fn installed_homeassistant(&self) -> Option<String>;

    fn set_installed_homeassistant(&self, tag: &str) -> Result<()>;
}

/// Network session shared by collaborators that talk HTTP.
#[async_trait]
pub trait SharedSession: Send + Sync {
    async fn close(&self);
}

#[async_trait]
impl TaskScheduler for Scheduler {
    fn register_task(&self, task: ScheduledTask, interval: Duration, first_run: bool) {
        Scheduler::register_task(self, task, interval, first_run);
    }

    async fn shutdown(&self) {
        Scheduler::shutdown(self).await;
    }
}
