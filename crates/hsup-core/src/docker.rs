//! ---
//! hsup_section: "03-container-management"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Docker CLI backed supervisor and application containers."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Output, Stdio};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::collaborators::{ApplicationContainer, SupervisorContainer};

/// Image label carrying the release version of supervisor-managed images.
pub const VERSION_LABEL: &str = "io.hass.version";

/// Thin async wrapper around the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(args).stdin(Stdio::null());
        command
    }

    /// Run a command to completion, capturing its output.
    pub async fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(binary = %self.binary.display(), ?args, "docker command");
        self.command(args)
            .output()
            .await
            .with_context(|| format!("failed to execute {} {}", self.binary.display(), args.join(" ")))
    }

    /// Run a command with inherited stdout/stderr and wait for it to exit.
    pub async fn status(&self, args: &[&str]) -> Result<ExitStatus> {
        debug!(binary = %self.binary.display(), ?args, "docker command");
        self.command(args)
            .status()
            .await
            .with_context(|| format!("failed to execute {} {}", self.binary.display(), args.join(" ")))
    }
}

#[derive(Debug, Deserialize)]
struct ContainerConfig {
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "Labels", default)]
    labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttachedImage {
    image: String,
    version: String,
}

impl AttachedImage {
    fn from_config(config: ContainerConfig) -> Self {
        let label = config
            .labels
            .as_ref()
            .and_then(|labels| labels.get(VERSION_LABEL))
            .cloned();
        let (image, tag) = split_reference(&config.image);
        Self {
            version: label
                .or(tag)
                .unwrap_or_else(|| "latest".to_owned()),
            image,
        }
    }
}

/// Split `repo[:tag]` while leaving registry ports (`host:5000/repo`) intact.
fn split_reference(reference: &str) -> (String, Option<String>) {
    match reference.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo.to_owned(), Some(tag.to_owned())),
        _ => (reference.to_owned(), None),
    }
}

/// The supervisor's own container, resolved by name.
#[derive(Debug)]
pub struct DockerSupervisor {
    docker: DockerCli,
    container: String,
    attached: RwLock<Option<AttachedImage>>,
}

impl DockerSupervisor {
    pub fn new(docker: DockerCli, container: impl Into<String>) -> Self {
        Self {
            docker,
            container: container.into(),
            attached: RwLock::new(None),
        }
    }
}

#[async_trait]
impl SupervisorContainer for DockerSupervisor {
    async fn attach(&self) -> Result<()> {
        let output = self
            .docker
            .output(&["inspect", "--format", "{{json .Config}}", &self.container])
            .await?;
        if !output.status.success() {
            return Err(anyhow!(
                "docker inspect {} failed: {}",
                self.container,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        let config: ContainerConfig = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("unexpected inspect output for {}", self.container))?;
        *self.attached.write() = Some(AttachedImage::from_config(config));
        Ok(())
    }

    fn image(&self) -> Option<String> {
        self.attached.read().as_ref().map(|a| a.image.clone())
    }

    fn version(&self) -> Option<String> {
        self.attached.read().as_ref().map(|a| a.version.clone())
    }
}

/// The managed home automation container.
///
/// Installed images are retagged as `latest`, which is what [`ApplicationContainer::run`]
/// starts.
#[derive(Debug)]
pub struct DockerHomeAssistant {
    docker: DockerCli,
    image: String,
    container: String,
    config_dir: PathBuf,
}

impl DockerHomeAssistant {
    pub fn new(
        docker: DockerCli,
        image: impl Into<String>,
        container: impl Into<String>,
        config_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            docker,
            image: image.into(),
            container: container.into(),
            config_dir: config_dir.into(),
        }
    }

    fn run_args(&self) -> Vec<String> {
        vec![
            "run".to_owned(),
            "--rm".to_owned(),
            "--name".to_owned(),
            self.container.clone(),
            "--privileged".to_owned(),
            "--network".to_owned(),
            "host".to_owned(),
            "-v".to_owned(),
            format!("{}:/config", self.config_dir.display()),
            format!("{}:latest", self.image),
        ]
    }
}

#[async_trait]
impl ApplicationContainer for DockerHomeAssistant {
    async fn install(&self, tag: &str) -> Result<bool> {
        let reference = format!("{}:{}", self.image, tag);
        info!(image = %reference, "pulling home assistant image");
        let pull = self.docker.output(&["pull", &reference]).await?;
        if !pull.status.success() {
            warn!(
                image = %reference,
                stderr = %String::from_utf8_lossy(&pull.stderr).trim(),
                "docker pull failed"
            );
            return Ok(false);
        }
        let latest = format!("{}:latest", self.image);
        let retag = self.docker.output(&["tag", &reference, &latest]).await?;
        if !retag.status.success() {
            warn!(image = %reference, "docker tag failed");
            return Ok(false);
        }
        Ok(true)
    }

    async fn run(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.config_dir)
            .await
            .with_context(|| format!("unable to create {}", self.config_dir.display()))?;
        // A stale container from a previous run would block the name.
        let _ = self.docker.output(&["rm", "-f", &self.container]).await;

        let args = self.run_args();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let status = self.docker.status(&args).await?;
        if status.success() {
            Ok(())
        } else {
            Err(anyhow!("{} exited with {}", self.container, status))
        }
    }

    fn image(&self) -> String {
        self.image.clone()
    }
}
