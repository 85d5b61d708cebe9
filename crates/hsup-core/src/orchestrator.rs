//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Primary orchestration and lifecycle management."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hsup_common::config::AppConfig;
use hsup_rt::ScheduledTask;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::collaborators::{
    ApplicationContainer, ConfigStore, HostControl, ManagementApi, SharedSession,
    SupervisorContainer, TaskScheduler,
};
use crate::error::OrchestratorError;
use crate::retry::RetryPolicy;

const UPDATE_INFO_TASK: &str = "fetch_update_infos";

/// Progress through the startup sequence. Each stage implies all earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StartupStage {
    Constructed,
    SupervisorAttached,
    HostInfoQueried,
    ApiViewsRegistered,
    TasksScheduled,
    ApplicationInstalled,
    ApiStarted,
    ApplicationRunning,
    Stopped,
}

/// Collaborator handles owned by the orchestrator.
///
/// Built once per process and moved into [`Orchestrator::new`]; the handles
/// cannot be swapped afterwards.
pub struct OrchestratorState {
    pub supervisor: Arc<dyn SupervisorContainer>,
    pub homeassistant: Arc<dyn ApplicationContainer>,
    pub host_control: Arc<dyn HostControl>,
    pub api: Arc<dyn ManagementApi>,
    pub scheduler: Arc<dyn TaskScheduler>,
    pub session: Arc<dyn SharedSession>,
    pub config: Arc<dyn ConfigStore>,
}

impl fmt::Debug for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorState").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    /// Recurrence of the update-info fetch task.
    pub update_interval: Duration,
    pub install_retry: RetryPolicy,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            update_interval: config.update.interval,
            install_retry: RetryPolicy::from_config(&config.install),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(28_800),
            install_retry: RetryPolicy::default(),
        }
    }
}

/// Cancels a pending application run.
///
/// Best-effort: the orchestrator stops waiting on the run, but the container
/// itself is left to its own lifecycle.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    inner: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.inner.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.borrow()
    }
}

/// Sequences startup, first-run installation, steady-state run, and shutdown.
#[derive(Debug)]
pub struct Orchestrator {
    state: OrchestratorState,
    settings: OrchestratorSettings,
    stage: watch::Sender<StartupStage>,
    cancel: CancelHandle,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl Orchestrator {
    pub fn new(state: OrchestratorState, settings: OrchestratorSettings) -> Self {
        let (stage, _) = watch::channel(StartupStage::Constructed);
        let (cancel, _) = watch::channel(false);
        Self {
            state,
            settings,
            stage,
            cancel: CancelHandle {
                inner: Arc::new(cancel),
            },
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn stage(&self) -> StartupStage {
        *self.stage.borrow()
    }

    pub fn subscribe_stage(&self) -> watch::Receiver<StartupStage> {
        self.stage.subscribe()
    }

    /// Hook that ends a pending application run. [`Orchestrator::stop`] fires it too.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run the startup sequence and park on the application container.
    ///
    /// Resolves when the application stops or the run is cancelled. Only
    /// attach, api registration, and api start failures are returned; install
    /// failures are retried per [`OrchestratorSettings::install_retry`].
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(OrchestratorError::AlreadyStarted);
        }
        let state = &self.state;

        state
            .supervisor
            .attach()
            .await
            .map_err(OrchestratorError::Attach)?;
        info!(
            image = %state.supervisor.image().unwrap_or_default(),
            version = %state.supervisor.version().unwrap_or_default(),
            "attached to supervisor image"
        );
        self.advance(StartupStage::SupervisorAttached);

        match state.host_control.info().await {
            Some(host) => info!(
                os = %host.os,
                version = %host.version,
                hostname = %host.hostname,
                feature_level = host.level,
                "connected to host control"
            ),
            None => info!("host control unavailable; continuing without host diagnostics"),
        }
        self.advance(StartupStage::HostInfoQueried);

        self.register_views()?;
        self.advance(StartupStage::ApiViewsRegistered);

        self.schedule_tasks();
        self.advance(StartupStage::TasksScheduled);

        if state.config.installed_homeassistant().is_none() {
            info!("no home assistant container installed");
            self.install_homeassistant().await?;
        }
        self.advance(StartupStage::ApplicationInstalled);

        state
            .api
            .start()
            .await
            .map_err(OrchestratorError::ApiStart)?;
        self.advance(StartupStage::ApiStarted);

        info!(image = %state.homeassistant.image(), "running home assistant");
        self.advance(StartupStage::ApplicationRunning);
        self.run_application().await
    }

    /// Tear the system down. Safe to call more than once.
    ///
    /// The session close and api stop run concurrently; the scheduler is
    /// released only after both have finished.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            debug!("orchestrator already stopped");
            return;
        }
        info!(stage = ?self.stage(), "stopping orchestration");
        self.cancel.cancel();
        tokio::join!(self.state.session.close(), self.state.api.stop());
        self.state.scheduler.shutdown().await;
        self.advance(StartupStage::Stopped);
        info!("orchestrator shutdown complete");
    }

    fn advance(&self, stage: StartupStage) {
        debug!(stage = ?stage, "startup stage reached");
        self.stage.send_replace(stage);
    }

    fn register_views(&self) -> Result<(), OrchestratorError> {
        let state = &self.state;
        state
            .api
            .register_host(state.host_control.clone())
            .map_err(|error| OrchestratorError::ApiRegistration {
                view: "host",
                error,
            })?;
        state
            .api
            .register_supervisor(state.supervisor.clone())
            .map_err(|error| OrchestratorError::ApiRegistration {
                view: "supervisor",
                error,
            })?;
        state
            .api
            .register_homeassistant(state.homeassistant.clone())
            .map_err(|error| OrchestratorError::ApiRegistration {
                view: "homeassistant",
                error,
            })?;
        Ok(())
    }

    fn schedule_tasks(&self) {
        let config = self.state.config.clone();
        let task = ScheduledTask::new(UPDATE_INFO_TASK, move || {
            let config = config.clone();
            async move {
                if !config.fetch_update_infos().await {
                    debug!("scheduled update info fetch returned nothing");
                }
            }
        });
        self.state
            .scheduler
            .register_task(task, self.settings.update_interval, true);
    }

    /// Install the application image, retrying until an install succeeds.
    ///
    /// The latest known tag is re-read on every attempt, so a concurrent
    /// update-info fetch can end the loop early.
    async fn install_homeassistant(&self) -> Result<(), OrchestratorError> {
        let policy = self.settings.install_retry;
        let config = &self.state.config;
        let mut attempt: u32 = 0;
        let tag = loop {
            attempt += 1;
            if config.latest_homeassistant().is_none() && !config.fetch_update_infos().await {
                debug!(attempt, "update info fetch returned nothing");
            }

            if let Some(tag) = config.latest_homeassistant() {
                match self.state.homeassistant.install(&tag).await {
                    Ok(true) => break tag,
                    Ok(false) => debug!(attempt, tag = %tag, "home assistant install failed"),
                    Err(err) => {
                        debug!(attempt, tag = %tag, error = %err, "home assistant install errored")
                    }
                }
            }

            if !policy.should_retry(attempt) {
                warn!(attempt, "giving up on home assistant setup");
                return Err(OrchestratorError::InstallExhausted { attempts: attempt });
            }
            let delay = policy.delay_for(attempt);
            warn!(
                attempt,
                delay_secs = delay.as_secs(),
                "error on setup home assistant; retrying"
            );
            tokio::time::sleep(delay).await;
        };

        if let Err(err) = config.set_installed_homeassistant(&tag) {
            warn!(tag = %tag, error = %err, "failed to persist installed home assistant tag");
        }
        info!(tag = %tag, attempts = attempt, "home assistant docker now exists");
        Ok(())
    }

    async fn run_application(&self) -> Result<(), OrchestratorError> {
        let mut cancelled = self.cancel.inner.subscribe();
        if *cancelled.borrow_and_update() {
            info!("application run cancelled before start");
            return Ok(());
        }
        tokio::select! {
            result = self.state.homeassistant.run() => {
                result.map_err(OrchestratorError::Application)?;
                info!("home assistant stopped");
                Ok(())
            }
            _ = cancelled.wait_for(|cancelled| *cancelled) => {
                info!("application run cancelled; container left running under docker");
                Ok(())
            }
        }
    }
}
