//! ---
//! hsup_section: "05-networking-external-interfaces"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Client for the privileged host-control socket."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::collaborators::{HostControl, HostInfo};

/// Line-oriented client for the host-control daemon's Unix socket.
///
/// Each request opens a fresh connection, writes one command line, and reads
/// a single JSON line back.
#[derive(Debug, Clone)]
pub struct HostControlSocket {
    path: PathBuf,
    timeout: Duration,
}

impl HostControlSocket {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Send `command` and return the raw response line.
    pub async fn send_command(&self, command: &str) -> Result<String> {
        tokio::time::timeout(self.timeout, self.exchange(command))
            .await
            .with_context(|| format!("host control timed out after {:?}", self.timeout))?
    }

    #[cfg(unix)]
    async fn exchange(&self, command: &str) -> Result<String> {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
        use tokio::net::UnixStream;

        let mut stream = UnixStream::connect(&self.path)
            .await
            .with_context(|| format!("unable to connect to {}", self.path.display()))?;
        stream
            .write_all(format!("{command}\n").as_bytes())
            .await
            .context("failed to send host control command")?;
        let mut line = String::new();
        BufReader::new(stream)
            .read_line(&mut line)
            .await
            .context("failed to read host control response")?;
        Ok(line.trim_end().to_owned())
    }

    #[cfg(not(unix))]
    async fn exchange(&self, _command: &str) -> Result<String> {
        anyhow::bail!("host control requires unix domain sockets")
    }
}

#[async_trait]
impl HostControl for HostControlSocket {
    async fn info(&self) -> Option<HostInfo> {
        if !self.path.exists() {
            debug!(socket = %self.path.display(), "host control socket not present");
            return None;
        }
        let response = match self.send_command("info").await {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "host control info request failed");
                return None;
            }
        };
        match serde_json::from_str::<HostInfo>(&response) {
            Ok(info) => Some(info),
            Err(err) => {
                debug!(error = %err, response = %response, "malformed host control info");
                None
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::UnixListener;

    fn serve_once(listener: UnixListener, reply: &'static str) -> tokio::task::JoinHandle<String> {
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let (read, mut write) = stream.into_split();
            let mut command = String::new();
            BufReader::new(read)
                .read_line(&mut command)
                .await
                .expect("read command");
            write.write_all(reply.as_bytes()).await.expect("reply");
            command
        })
    }

    #[tokio::test]
    async fn info_parses_host_description() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hc.sock");
        let listener = UnixListener::bind(&path).expect("bind");
        let server = serve_once(
            listener,
            "{\"os\":\"ResinOS\",\"version\":\"2.0\",\"hostname\":\"hassio\",\"level\":16}\n",
        );

        let client = HostControlSocket::new(&path, Duration::from_secs(5));
        let info = client.info().await.expect("host info");
        assert_eq!(info.os, "ResinOS");
        assert_eq!(info.hostname, "hassio");
        assert_eq!(info.level, 16);
        assert_eq!(server.await.expect("server"), "info\n");
    }

    #[tokio::test]
    async fn missing_socket_yields_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let client = HostControlSocket::new(dir.path().join("absent.sock"), Duration::from_secs(1));
        assert!(client.info().await.is_none());
    }

    #[tokio::test]
    async fn malformed_reply_yields_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hc.sock");
        let listener = UnixListener::bind(&path).expect("bind");
        let server = serve_once(listener, "not json\n");

        let client = HostControlSocket::new(&path, Duration::from_secs(5));
        assert!(client.info().await.is_none());
        server.await.expect("server");
    }
}
