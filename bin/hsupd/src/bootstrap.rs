//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "binary"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Collaborator wiring for the HSUP daemon."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use hsup_api::RestApi;
use hsup_common::config::AppConfig;
use hsup_core::docker::{DockerCli, DockerHomeAssistant, DockerSupervisor};
use hsup_core::host_control::HostControlSocket;
use hsup_core::session::HttpSession;
use hsup_core::system::SystemConfiguration;
use hsup_core::{Orchestrator, OrchestratorSettings, OrchestratorState};
use hsup_rt::Scheduler;
use tracing::debug;

/// Shared HTTP session plus the persisted system configuration built on it.
pub fn system_configuration(
    config: &AppConfig,
) -> Result<(Arc<HttpSession>, Arc<SystemConfiguration>)> {
    let session = Arc::new(HttpSession::new(config.update.request_timeout)?);
    let system = SystemConfiguration::initialize(
        config.system_config_path(),
        config.update.url.clone(),
        session.clone(),
    )
    .context("failed to initialise system configuration")?;
    Ok((session, Arc::new(system)))
}

/// Assemble the production collaborators described by `config`.
pub fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator> {
    let (session, system) = system_configuration(config)?;
    let docker = DockerCli::new(config.docker.binary.clone());

    let state = OrchestratorState {
        supervisor: Arc::new(DockerSupervisor::new(
            docker.clone(),
            config.docker.supervisor_container.clone(),
        )),
        homeassistant: Arc::new(DockerHomeAssistant::new(
            docker,
            config.docker.homeassistant_image.clone(),
            config.docker.homeassistant_container.clone(),
            config.homeassistant_config_dir(),
        )),
        host_control: Arc::new(HostControlSocket::new(
            config.host_control.socket.clone(),
            config.host_control.timeout,
        )),
        api: Arc::new(RestApi::new(config.api.listen, system.clone())),
        scheduler: Arc::new(Scheduler::new()),
        session,
        config: system,
    };
    debug!(data_dir = %config.data_dir.display(), "collaborators assembled");
    Ok(Orchestrator::new(
        state,
        OrchestratorSettings::from_config(config),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsup_core::{ConfigStore, StartupStage};
    use tempfile::tempdir;

    #[tokio::test]
    async fn wiring_creates_state_file_under_data_dir() {
        let dir = tempdir().expect("tempdir");
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };

        let orchestrator = build_orchestrator(&config).expect("wiring succeeds");
        assert_eq!(orchestrator.stage(), StartupStage::Constructed);
        assert!(config.system_config_path().exists());

        let (_, system) = system_configuration(&config).expect("reload");
        assert!(system.installed_homeassistant().is_none());
    }
}
