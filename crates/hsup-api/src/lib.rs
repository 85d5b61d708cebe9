//! ---
//! hsup_section: "05-networking-external-interfaces"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Management REST API over the supervisor collaborators."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
//! Management REST API.
//!
//! Views are registered by the orchestrator before [`ManagementApi::start`];
//! only registered views are routed.

use std::fmt;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use hsup_common::version::VersionInfo;
use hsup_core::{
    ApplicationContainer, ConfigStore, HostControl, HostInfo, ManagementApi, SupervisorContainer,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Default)]
struct Views {
    host: Option<Arc<dyn HostControl>>,
    supervisor: Option<Arc<dyn SupervisorContainer>>,
    homeassistant: Option<Arc<dyn ApplicationContainer>>,
}

/// Shared state handed to request handlers.
struct ApiState {
    config: Arc<dyn ConfigStore>,
    version: VersionInfo,
    host: Option<Arc<dyn HostControl>>,
    supervisor: Option<Arc<dyn SupervisorContainer>>,
    homeassistant: Option<Arc<dyn ApplicationContainer>>,
}

impl fmt::Debug for ApiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiState")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Handle to the running API server.
#[derive(Debug)]
pub struct ApiServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ApiServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        }
    }
}

/// [`ManagementApi`] served over HTTP with axum.
pub struct RestApi {
    listen: SocketAddr,
    config: Arc<dyn ConfigStore>,
    version: VersionInfo,
    views: RwLock<Views>,
    server: Mutex<Option<ApiServer>>,
}

impl RestApi {
    pub fn new(listen: SocketAddr, config: Arc<dyn ConfigStore>) -> Self {
        Self {
            listen,
            config,
            version: VersionInfo::current(),
            views: RwLock::new(Views::default()),
            server: Mutex::new(None),
        }
    }

    /// Bound address once started; resolves port `0` to the real port.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.lock().as_ref().map(ApiServer::addr)
    }

    fn router(&self) -> Router {
        let views = self.views.read();
        let state = Arc::new(ApiState {
            config: self.config.clone(),
            version: self.version.clone(),
            host: views.host.clone(),
            supervisor: views.supervisor.clone(),
            homeassistant: views.homeassistant.clone(),
        });

        let mut router = Router::new().route("/healthz", get(get_health));
        if state.host.is_some() {
            router = router.route("/host/info", get(get_host_info));
        }
        if state.supervisor.is_some() {
            router = router.route("/supervisor/info", get(get_supervisor_info));
        }
        if state.homeassistant.is_some() {
            router = router.route("/homeassistant/info", get(get_homeassistant_info));
        }
        router.with_state(state).layer(TraceLayer::new_for_http())
    }
}

impl fmt::Debug for RestApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestApi")
            .field("listen", &self.listen)
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

fn register<T: ?Sized>(slot: &mut Option<Arc<T>>, view: &str, value: Arc<T>) -> Result<()> {
    if slot.is_some() {
        bail!("{view} view already registered");
    }
    *slot = Some(value);
    Ok(())
}

#[async_trait]
impl ManagementApi for RestApi {
    fn register_host(&self, host: Arc<dyn HostControl>) -> Result<()> {
        register(&mut self.views.write().host, "host", host)
    }

    fn register_supervisor(&self, supervisor: Arc<dyn SupervisorContainer>) -> Result<()> {
        register(&mut self.views.write().supervisor, "supervisor", supervisor)
    }

    fn register_homeassistant(&self, homeassistant: Arc<dyn ApplicationContainer>) -> Result<()> {
        register(
            &mut self.views.write().homeassistant,
            "homeassistant",
            homeassistant,
        )
    }

    async fn start(&self) -> Result<()> {
        if self.server.lock().is_some() {
            return Err(anyhow!("api server already running"));
        }
        let server = spawn_api_server(self.router(), self.listen)?;
        *self.server.lock() = Some(server);
        Ok(())
    }

    async fn stop(&self) {
        let server = self.server.lock().take();
        let Some(server) = server else {
            return;
        };
        let addr = server.addr();
        match server.shutdown().await {
            Ok(()) => info!(address = %addr, "api server stopped"),
            Err(err) => warn!(address = %addr, error = %err, "api server stopped with error"),
        }
    }
}

/// Bind `addr` and serve `router` until the returned handle is shut down.
pub fn spawn_api_server(router: Router, addr: SocketAddr) -> Result<ApiServer> {
    let listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind API listener {addr}"))?;
    listener
        .set_nonblocking(true)
        .context("failed to configure API listener as non-blocking")?;
    let addr = listener
        .local_addr()
        .context("failed to resolve API listener address")?;
    let tcp_listener =
        TcpListener::from_std(listener).context("failed to create tokio listener")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        info!(address = %addr, "api server listening");
        if let Err(err) = axum::serve(tcp_listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
        {
            error!(address = %addr, error = %err, "api server exited with error");
            return Err(err.into());
        }
        Ok(())
    });

    Ok(ApiServer {
        addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: String,
}

#[derive(Debug, Serialize)]
struct SupervisorInfoResponse {
    image: Option<String>,
    version: Option<String>,
    api_version: String,
}

#[derive(Debug, Serialize)]
struct HomeAssistantInfoResponse {
    image: String,
    version: Option<String>,
    current: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

async fn get_health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: state.version.cli_string(),
    })
}

async fn get_host_info(State(state): State<Arc<ApiState>>) -> Result<Json<HostInfo>, ApiError> {
    let host = state.host.as_ref().ok_or_else(unavailable)?;
    host.info()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "host control unavailable"))
}

async fn get_supervisor_info(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<SupervisorInfoResponse>, ApiError> {
    let supervisor = state.supervisor.as_ref().ok_or_else(unavailable)?;
    Ok(Json(SupervisorInfoResponse {
        image: supervisor.image(),
        version: supervisor.version(),
        api_version: state.version.semver.clone(),
    }))
}

async fn get_homeassistant_info(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<HomeAssistantInfoResponse>, ApiError> {
    let homeassistant = state.homeassistant.as_ref().ok_or_else(unavailable)?;
    Ok(Json(HomeAssistantInfoResponse {
        image: homeassistant.image(),
        version: state.config.installed_homeassistant(),
        current: state.config.latest_homeassistant(),
    }))
}

fn unavailable() -> ApiError {
    ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "view not registered")
}
