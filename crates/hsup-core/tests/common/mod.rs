//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "tests"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Primary orchestration and lifecycle management."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
//! Recording collaborator doubles shared by the orchestrator tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hsup_core::{
    ApplicationContainer, ConfigStore, HostControl, HostInfo, ManagementApi, Orchestrator,
    OrchestratorSettings, OrchestratorState, RetryPolicy, SharedSession, SupervisorContainer,
    TaskScheduler,
};
use hsup_rt::{ScheduledTask, Scheduler};
use parking_lot::Mutex;
use tokio::time::Instant;

pub const UPDATE_INTERVAL: Duration = Duration::from_secs(28_800);

/// Ordered log of every collaborator call.
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events.lock().iter().position(|e| e == event)
    }
}

pub struct MockSupervisor {
    pub recorder: Arc<Recorder>,
    pub fail: bool,
}

#[async_trait]
impl SupervisorContainer for MockSupervisor {
    async fn attach(&self) -> Result<()> {
        self.recorder.push("attach");
        if self.fail {
            Err(anyhow!("image hassio_supervisor not found"))
        } else {
            Ok(())
        }
    }

    fn image(&self) -> Option<String> {
        Some("pvizeli/hassio".to_owned())
    }

    fn version(&self) -> Option<String> {
        Some("0.9".to_owned())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum RunBehavior {
    Exit,
    Forever,
}

pub struct MockApplication {
    pub recorder: Arc<Recorder>,
    /// Scripted install outcomes; `Ok(true)` once exhausted.
    pub installs: Mutex<VecDeque<Result<bool, String>>>,
    pub installed_tags: Mutex<Vec<String>>,
    pub run: RunBehavior,
}

#[async_trait]
impl ApplicationContainer for MockApplication {
    async fn install(&self, tag: &str) -> Result<bool> {
        self.recorder.push("install");
        self.installed_tags.lock().push(tag.to_owned());
        match self.installs.lock().pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(true),
        }
    }

    async fn run(&self) -> Result<()> {
        self.recorder.push("run");
        match self.run {
            RunBehavior::Exit => Ok(()),
            RunBehavior::Forever => std::future::pending().await,
        }
    }

    fn image(&self) -> String {
        "homeassistant/home-assistant".to_owned()
    }
}

pub struct MockHostControl {
    pub recorder: Arc<Recorder>,
    pub info: Option<HostInfo>,
}

#[async_trait]
impl HostControl for MockHostControl {
    async fn info(&self) -> Option<HostInfo> {
        self.recorder.push("host_info");
        self.info.clone()
    }
}

pub struct MockApi {
    pub recorder: Arc<Recorder>,
    pub fail_start: bool,
    pub stop_delay: Duration,
}

#[async_trait]
impl ManagementApi for MockApi {
    fn register_host(&self, _host: Arc<dyn HostControl>) -> Result<()> {
        self.recorder.push("register_host");
        Ok(())
    }

    fn register_supervisor(&self, _supervisor: Arc<dyn SupervisorContainer>) -> Result<()> {
        self.recorder.push("register_supervisor");
        Ok(())
    }

    fn register_homeassistant(&self, _homeassistant: Arc<dyn ApplicationContainer>) -> Result<()> {
        self.recorder.push("register_homeassistant");
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.recorder.push("api_start");
        if self.fail_start {
            Err(anyhow!("address already in use"))
        } else {
            Ok(())
        }
    }

    async fn stop(&self) {
        self.recorder.push("api_stop");
        tokio::time::sleep(self.stop_delay).await;
        self.recorder.push("api_stop_done");
    }
}

#[derive(Default)]
pub struct MockScheduler {
    pub recorder: Arc<Recorder>,
    pub registrations: Mutex<Vec<(String, Duration, bool)>>,
}

#[async_trait]
impl TaskScheduler for MockScheduler {
    fn register_task(&self, task: ScheduledTask, interval: Duration, first_run: bool) {
        self.recorder.push("register_task");
        self.registrations
            .lock()
            .push((task.name().to_owned(), interval, first_run));
    }

    async fn shutdown(&self) {
        self.recorder.push("scheduler_shutdown");
    }
}

pub struct MockConfig {
    pub recorder: Arc<Recorder>,
    /// Tag published by every fetch; `None` simulates an empty or failing feed.
    pub feed: Mutex<Option<String>>,
    pub latest: Mutex<Option<String>>,
    pub installed: Mutex<Option<String>>,
    pub fetches: Mutex<Vec<Instant>>,
}

#[async_trait]
impl ConfigStore for MockConfig {
    async fn fetch_update_infos(&self) -> bool {
        self.recorder.push("fetch");
        self.fetches.lock().push(Instant::now());
        match self.feed.lock().clone() {
            Some(tag) => {
                *self.latest.lock() = Some(tag);
                true
            }
            None => false,
        }
    }

    fn latest_homeassistant(&self) -> Option<String> {
        self.latest.lock().clone()
    }

    fn installed_homeassistant(&self) -> Option<String> {
        self.installed.lock().clone()
    }

    fn set_installed_homeassistant(&self, tag: &str) -> Result<()> {
        self.recorder.push("set_installed");
        *self.installed.lock() = Some(tag.to_owned());
        Ok(())
    }
}

pub struct MockSession {
    pub recorder: Arc<Recorder>,
    pub close_delay: Duration,
}

#[async_trait]
impl SharedSession for MockSession {
    async fn close(&self) {
        self.recorder.push("session_close");
        tokio::time::sleep(self.close_delay).await;
        self.recorder.push("session_close_done");
    }
}

/// Knobs for a mocked orchestrator; defaults describe a healthy first boot.
pub struct Scenario {
    pub attach_fails: bool,
    pub host_info: Option<HostInfo>,
    pub installed: Option<String>,
    pub feed: Option<String>,
    pub installs: Vec<Result<bool, String>>,
    pub run: RunBehavior,
    pub api_start_fails: bool,
    pub api_stop_delay: Duration,
    pub session_close_delay: Duration,
    pub retry: RetryPolicy,
    /// Drive registered tasks with a real [`Scheduler`] instead of recording them.
    pub live_scheduler: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            attach_fails: false,
            host_info: Some(HostInfo {
                os: "ResinOS".to_owned(),
                version: "2.0".to_owned(),
                hostname: "hassio".to_owned(),
                level: 16,
            }),
            installed: None,
            feed: Some("0.40".to_owned()),
            installs: Vec::new(),
            run: RunBehavior::Exit,
            api_start_fails: false,
            api_stop_delay: Duration::ZERO,
            session_close_delay: Duration::ZERO,
            retry: RetryPolicy::default(),
            live_scheduler: false,
        }
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub recorder: Arc<Recorder>,
    pub application: Arc<MockApplication>,
    pub scheduler: Arc<MockScheduler>,
    pub config: Arc<MockConfig>,
}

impl Scenario {
    pub fn build(self) -> Harness {
        let recorder = Arc::new(Recorder::default());
        let application = Arc::new(MockApplication {
            recorder: recorder.clone(),
            installs: Mutex::new(self.installs.into_iter().collect()),
            installed_tags: Mutex::new(Vec::new()),
            run: self.run,
        });
        let scheduler = Arc::new(MockScheduler {
            recorder: recorder.clone(),
            registrations: Mutex::new(Vec::new()),
        });
        let config = Arc::new(MockConfig {
            recorder: recorder.clone(),
            feed: Mutex::new(self.feed),
            latest: Mutex::new(None),
            installed: Mutex::new(self.installed),
            fetches: Mutex::new(Vec::new()),
        });
        let task_scheduler: Arc<dyn TaskScheduler> = if self.live_scheduler {
            Arc::new(Scheduler::new())
        } else {
            scheduler.clone()
        };
        let state = OrchestratorState {
            supervisor: Arc::new(MockSupervisor {
                recorder: recorder.clone(),
                fail: self.attach_fails,
            }),
            homeassistant: application.clone(),
            host_control: Arc::new(MockHostControl {
                recorder: recorder.clone(),
                info: self.host_info,
            }),
            api: Arc::new(MockApi {
                recorder: recorder.clone(),
                fail_start: self.api_start_fails,
                stop_delay: self.api_stop_delay,
            }),
            scheduler: task_scheduler,
            session: Arc::new(MockSession {
                recorder: recorder.clone(),
                close_delay: self.session_close_delay,
            }),
            config: config.clone(),
        };
        let settings = OrchestratorSettings {
            update_interval: UPDATE_INTERVAL,
            install_retry: self.retry,
        };
        Harness {
            orchestrator: Orchestrator::new(state, settings),
            recorder,
            application,
            scheduler,
            config,
        }
    }
}
