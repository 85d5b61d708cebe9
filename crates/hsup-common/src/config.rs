//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Shared primitives and utilities for the supervisor runtime."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_api_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 80))
}

fn default_update_url() -> String {
    "https://raw.githubusercontent.com/pvizeli/hassio/master/version.json".to_owned()
}

fn default_update_interval() -> Duration {
    Duration::from_secs(28_800)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_docker_binary() -> PathBuf {
    PathBuf::from("docker")
}

fn default_supervisor_container() -> String {
    "hassio_supervisor".to_owned()
}

fn default_homeassistant_image() -> String {
    "homeassistant/home-assistant".to_owned()
}

fn default_homeassistant_container() -> String {
    "homeassistant".to_owned()
}

fn default_host_control_socket() -> PathBuf {
    PathBuf::from("/var/run/hassio_hc.sock")
}

fn default_host_control_timeout() -> Duration {
    Duration::from_secs(15)
}

/// Primary configuration object for the supervisor daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root for persisted supervisor state and the application's config volume.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub host_control: HostControlConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "HSUP_CONFIG";

    /// Load configuration from disk, respecting the `HSUP_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Location of the persisted system configuration document.
    pub fn system_config_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    /// Host directory mounted as the application container's `/config` volume.
    pub fn homeassistant_config_dir(&self) -> PathBuf {
        self.data_dir.join("homeassistant")
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.update.validate()?;
        self.install.validate()?;
        self.docker.validate()?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            logging: LoggingConfig::default(),
            api: ApiConfig::default(),
            update: UpdateConfig::default(),
            install: InstallConfig::default(),
            docker: DockerConfig::default(),
            host_control: HostControlConfig::default(),
        }
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Rolling log file directory; stdout only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_api_listen(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Version feed advertising the latest supervisor and application tags.
    #[serde(default = "default_update_url")]
    pub url: String,
    /// Recurrence of the background update-info fetch.
    #[serde(default = "default_update_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub interval: Duration,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            url: default_update_url(),
            interval: default_update_interval(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl UpdateConfig {
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.url)
            .with_context(|| format!("update url '{}' is not a valid url", self.url))?;
        if self.interval.is_zero() {
            return Err(anyhow!("update interval must be greater than zero"));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Fixed pause between failed first-run installation attempts.
    #[serde(default = "default_retry_delay")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub retry_delay: Duration,
    /// Attempt ceiling; unset retries until the install succeeds.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            retry_delay: default_retry_delay(),
            max_attempts: None,
        }
    }
}

impl InstallConfig {
    pub fn validate(&self) -> Result<()> {
        if self.retry_delay.is_zero() {
            return Err(anyhow!("install retry_delay must be greater than zero"));
        }
        if self.max_attempts == Some(0) {
            return Err(anyhow!("install max_attempts must be at least 1 when set"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default = "default_docker_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_supervisor_container")]
    pub supervisor_container: String,
    #[serde(default = "default_homeassistant_image")]
    pub homeassistant_image: String,
    #[serde(default = "default_homeassistant_container")]
    pub homeassistant_container: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: default_docker_binary(),
            supervisor_container: default_supervisor_container(),
            homeassistant_image: default_homeassistant_image(),
            homeassistant_container: default_homeassistant_container(),
        }
    }
}

impl DockerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.homeassistant_image.trim().is_empty() {
            return Err(anyhow!("docker homeassistant_image must not be empty"));
        }
        let repository = self
            .homeassistant_image
            .rsplit('/')
            .next()
            .unwrap_or_default();
        if repository.contains(':') {
            return Err(anyhow!(
                "docker homeassistant_image '{}' must not carry a tag",
                self.homeassistant_image
            ));
        }
        if self.supervisor_container.trim().is_empty()
            || self.homeassistant_container.trim().is_empty()
        {
            return Err(anyhow!("docker container names must not be empty"));
        }
        Ok(())
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostControlConfig {
    #[serde(default = "default_host_control_socket")]
    pub socket: PathBuf,
    #[serde(default = "default_host_control_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
}

impl Default for HostControlConfig {
    fn default() -> Self {
        Self {
            socket: default_host_control_socket(),
            timeout: default_host_control_timeout(),
        }
    }
}
