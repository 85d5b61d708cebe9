//! ---
//! hsup_section: "05-networking-external-interfaces"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Shared HTTP session used by supervisor collaborators."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::collaborators::SharedSession;

/// Process-wide HTTP client. Closing it makes later requests fail fast.
#[derive(Debug)]
pub struct HttpSession {
    client: RwLock<Option<reqwest::Client>>,
}

impl HttpSession {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hsup/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client: RwLock::new(Some(client)),
        })
    }

    /// Handle to the underlying client; errors once the session is closed.
    pub fn client(&self) -> Result<reqwest::Client> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| anyhow!("http session is closed"))
    }

    pub fn is_closed(&self) -> bool {
        self.client.read().is_none()
    }
}

#[async_trait]
impl SharedSession for HttpSession {
    async fn close(&self) {
        if self.client.write().take().is_some() {
            debug!("http session closed");
        }
    }
}
