//! Supervisor API for the range host.
//!
//! Exposes the host's command surface over HTTP and pushes host events to
//! connected supervisors over a WebSocket:
//!
//! - `GET /health`
//! - `GET /api/clients`, `GET /api/errors`, `DELETE /api/errors`
//! - `POST /api/training`, `POST /api/training/stop`, `GET /api/training/status`
//! - `POST /api/led`, `POST /api/buzzer`, `POST /api/effect`
//! - `GET /ws` (push channel)
//!
//! Every mutating route and the push channel require HTTP Basic credentials.
//!
//! # Usage
//!
//! ```ignore
//! let state = ApiState::new(host, &ApiConfig::default());
//! let server = ApiServer::bind(addr, state).await?;
//! server.serve(executor.on_shutdown_signal()).await?;
//! ```

mod auth;
mod error;
mod push;
mod routes;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use rangehost_host::Host;
use rangehost_tasks::Shutdown;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use auth::{
    AuthError, Authenticator, Authorized, Credentials, DEFAULT_LOCKOUT, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_USERNAME, LockoutPolicy,
};
pub use error::{ApiError, ApiJson, Message};
pub use push::{DEFAULT_MAX_PUSH_CLIENTS, PushCommand, PushLimiter, PushPermit};
pub use routes::{
    BuzzerRequest, ClientRequest, EffectRequest, Health, LedRequest, StatusQuery, StopResponse,
    TrainingRequest,
};

/// Settings of the API surface.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub credentials: Credentials,
    pub lockout: LockoutPolicy,
    pub max_push_clients: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::new(DEFAULT_USERNAME, ""),
            lockout: LockoutPolicy::default(),
            max_push_clients: DEFAULT_MAX_PUSH_CLIENTS,
        }
    }
}

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub host: Arc<Host>,
    pub auth: Arc<Authenticator>,
    pub push: Arc<PushLimiter>,
}

impl ApiState {
    pub fn new(host: Arc<Host>, config: &ApiConfig) -> Self {
        Self {
            host,
            auth: Arc::new(Authenticator::new(config.credentials.clone(), config.lockout)),
            push: Arc::new(PushLimiter::new(config.max_push_clients)),
        }
    }
}

/// Builds the API router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/clients", get(routes::clients))
        .route("/api/errors", get(routes::errors).delete(routes::clear_errors))
        .route("/api/training", post(routes::start_training))
        .route("/api/training/stop", post(routes::stop_training))
        .route("/api/training/status", get(routes::training_status))
        .route("/api/led", post(routes::send_led))
        .route("/api/buzzer", post(routes::send_buzzer))
        .route("/api/effect", post(routes::send_effect))
        .route("/ws", get(push::upgrade))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, thiserror::Error)]
#[error("failed to bind api server on {addr}: {source}")]
pub struct ApiBindError {
    pub addr: SocketAddr,
    #[source]
    pub source: io::Error,
}

/// HTTP server bound to a TCP listener.
#[derive(Debug)]
pub struct ApiServer {
    listener: TcpListener,
    router: Router,
}

impl ApiServer {
    pub async fn bind(addr: SocketAddr, state: ApiState) -> Result<Self, ApiBindError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiBindError { addr, source })?;
        Ok(Self {
            listener,
            router: router(state),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until `shutdown` fires, then drains open requests.
    pub async fn serve(self, mut shutdown: Shutdown) -> io::Result<()> {
        info!(addr = ?self.listener.local_addr().ok(), "api server listening");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;
        info!("api server stopped");
        Ok(())
    }
}
