//! ---
//! hsup_section: "04-configuration-orchestration"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Persisted system configuration and update-info refresh."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collaborators::ConfigStore;
use crate::session::HttpSession;

/// On-disk representation of the supervisor's system configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemData {
    /// Installed application tag; set only after a successful install.
    #[serde(default)]
    pub homeassistant_tag: Option<String>,
    /// Latest application tag advertised by the update feed.
    #[serde(default)]
    pub current_homeassistant: Option<String>,
    /// Latest supervisor tag advertised by the update feed.
    #[serde(default)]
    pub current_supervisor: Option<String>,
}

/// Update feed document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInfos {
    #[serde(default)]
    pub homeassistant_tag: Option<String>,
    #[serde(default)]
    pub hassio_tag: Option<String>,
}

/// JSON-file backed [`ConfigStore`].
#[derive(Debug)]
pub struct SystemConfiguration {
    path: PathBuf,
    update_url: String,
    session: Arc<HttpSession>,
    data: RwLock<SystemData>,
    /// Held across snapshot, serialisation and replace of the state file.
    persist: Mutex<()>,
}

impl SystemConfiguration {
    /// Load `path`, or start from an empty document when it does not exist yet.
    pub fn initialize(
        path: impl Into<PathBuf>,
        update_url: impl Into<String>,
        session: Arc<HttpSession>,
    ) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("unable to read system config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse system config {}", path.display()))?
        } else {
            debug!(path = %path.display(), "no system config found; starting fresh");
            SystemData::default()
        };
        let config = Self {
            path,
            update_url: update_url.into(),
            session,
            data: RwLock::new(data),
            persist: Mutex::new(()),
        };
        config.save()?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> SystemData {
        self.data.read().clone()
    }

    /// Record the tags advertised by an update feed document.
    pub fn apply_update_infos(&self, infos: &UpdateInfos) -> Result<()> {
        {
            let mut data = self.data.write();
            if let Some(tag) = &infos.homeassistant_tag {
                data.current_homeassistant = Some(tag.clone());
            }
            if let Some(tag) = &infos.hassio_tag {
                data.current_supervisor = Some(tag.clone());
            }
        }
        self.save()
    }

    async fn request_update_infos(&self) -> Result<UpdateInfos> {
        let client = self.session.client()?;
        let response = client
            .get(&self.update_url)
            .send()
            .await
            .with_context(|| format!("failed to fetch update info from {}", self.update_url))?
            .error_for_status()
            .context("update feed returned an error status")?;
        // The feed is served as text/plain, so decode the body explicitly.
        let body = response
            .text()
            .await
            .context("failed to read update feed body")?;
        serde_json::from_str(&body).context("failed to parse update feed")
    }

    fn save(&self) -> Result<()> {
        let _persist = self.persist.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("unable to create system config dir {}", parent.display())
            })?;
        }
        let serialised = serde_json::to_string_pretty(&*self.data.read())
            .context("failed to serialise system config")?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serialised)
            .with_context(|| format!("failed to write system config {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("failed to replace system config {}", self.path.display()))
    }
}

#[async_trait]
impl ConfigStore for SystemConfiguration {
    async fn fetch_update_infos(&self) -> bool {
        let infos = match self.request_update_infos().await {
            Ok(infos) => infos,
            Err(err) => {
                warn!(url = %self.update_url, error = %err, "can't fetch update infos");
                return false;
            }
        };
        if infos.homeassistant_tag.is_none() && infos.hassio_tag.is_none() {
            warn!(url = %self.update_url, "update feed carried no tags");
            return false;
        }
        if let Err(err) = self.apply_update_infos(&infos) {
            warn!(error = %err, "failed to persist update infos");
        }
        info!(
            homeassistant = ?infos.homeassistant_tag,
            supervisor = ?infos.hassio_tag,
            "update infos refreshed"
        );
        true
    }

    fn latest_homeassistant(&self) -> Option<String> {
        self.data.read().current_homeassistant.clone()
    }

    fn installed_homeassistant(&self) -> Option<String> {
        self.data.read().homeassistant_tag.clone()
    }

    fn set_installed_homeassistant(&self, tag: &str) -> Result<()> {
        self.data.write().homeassistant_tag = Some(tag.to_owned());
        self.save()
    }
}
