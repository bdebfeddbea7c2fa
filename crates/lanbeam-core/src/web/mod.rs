//! Embedded web server for Lanbeam.
//!
//! Phones and other browsers on the same network open the bundled upload
//! page, which keeps a WebSocket session to the host. Files are offered to
//! those sessions through the HTTP API, and files go the other way through
//! the upload endpoint.
//!
//! ## API Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | / | Redirect to the upload page |
//! | WS | /ws/connect | Device session |
//! | POST | /send_file | Offer a host file to a device |
//! | POST | /upload | Upload a file to the host |
//! | GET | /record_ip | Announce the caller |
//! | GET | /remove_ip | Withdraw the caller |
//! | GET | /get_ips | List announced devices |
//! | GET | /detect_ip | Report the caller's address |
//! | GET | /api/sessions | Registered sessions and pending offers |
//! | GET | /api/qr | QR code of the upload page (SVG) |
//! | GET | /static/* | Embedded assets |

pub mod assets;
pub mod error;
pub mod handlers;
pub mod state;
pub mod ws;

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    response::Redirect,
    routing::{get, post},
    Router,
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::{Config, TransferConfig};
use crate::error::Result;
use crate::net::UPLOAD_PAGE_PATH;

pub use state::{AppState, SharedState};

/// Configuration for the web server.
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind to localhost only
    pub localhost_only: bool,
    /// Directory uploads are written to
    pub upload_dir: PathBuf,
    /// Largest accepted upload body in bytes
    pub max_upload_size: usize,
    /// Transfer tunables handed to the handshake
    pub transfer: TransferConfig,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for WebServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            port: config.server.port,
            localhost_only: config.server.localhost_only,
            upload_dir: config.server.upload_dir.clone(),
            max_upload_size: config.server.max_upload_size,
            transfer: config.transfer.clone(),
        }
    }
}

impl WebServerConfig {
    /// Get the bind address for the server.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        if self.localhost_only {
            SocketAddr::from(([127, 0, 0, 1], self.port))
        } else {
            SocketAddr::from(([0, 0, 0, 0], self.port))
        }
    }
}

/// Build the application router over `state`.
pub fn router(state: SharedState) -> Router {
    let upload_limit = state.config.max_upload_size;

    Router::new()
        .route("/", get(|| async { Redirect::temporary(UPLOAD_PAGE_PATH) }))
        .route("/ws/connect", get(ws::connect))
        .route("/send_file", post(handlers::send_file))
        .route(
            "/upload",
            post(handlers::upload)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(upload_limit)),
        )
        .route("/record_ip", get(handlers::record_ip))
        .route("/remove_ip", get(handlers::remove_ip))
        .route("/get_ips", get(handlers::get_ips))
        .route("/detect_ip", get(handlers::detect_ip))
        .route("/api/sessions", get(handlers::get_sessions))
        .route("/api/qr", get(handlers::get_qr))
        .route("/static/{*path}", get(assets::serve_static))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The web server instance.
#[derive(Debug)]
pub struct WebServer {
    state: SharedState,
}

impl WebServer {
    /// Create a new web server with the given configuration.
    #[must_use]
    pub fn new(config: WebServerConfig) -> Self {
        Self {
            state: Arc::new(AppState::new(config)),
        }
    }

    /// Create a server over existing state.
    #[must_use]
    pub const fn with_state(state: SharedState) -> Self {
        Self { state }
    }

    /// Get the server configuration.
    #[must_use]
    pub fn config(&self) -> &WebServerConfig {
        &self.state.config
    }

    /// Shared state handed to every handler.
    #[must_use]
    pub const fn state(&self) -> &SharedState {
        &self.state
    }

    /// URL devices open to reach the upload page.
    #[must_use]
    pub fn upload_page_url(&self) -> String {
        self.state.upload_page_url()
    }

    /// Serve until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload directory cannot be created or the
    /// listener cannot be bound.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let config = &self.state.config;
        tokio::fs::create_dir_all(&config.upload_dir).await?;

        let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
        tracing::info!("Web server listening on {}", listener.local_addr()?);

        axum::serve(
            listener,
            router(Arc::clone(&self.state)).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        tracing::info!("Web server stopped");
        Ok(())
    }
}
