//! HTTP server for the browser UI
//!
//! JSON endpoints under `/api` drive the session controller; `/api/events`
//! streams every state change so the page can redraw only what moved.

pub mod chat;
mod error;
pub mod events;
pub mod health;
mod ui;
pub mod voice;

pub use error::{ApiError, failure_status};

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::DEFAULT_PORT;
use crate::session::SessionController;

/// Shared state for API handlers
pub struct ApiState {
    pub controller: Arc<SessionController>,
    /// Whether `/api/voice/listen` may open the server's microphone
    pub server_microphone: bool,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    controller: Arc<SessionController>,
    port: u16,
    static_dir: Option<PathBuf>,
    server_microphone: bool,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(controller: Arc<SessionController>) -> Self {
        Self {
            controller,
            port: DEFAULT_PORT,
            static_dir: None,
            server_microphone: true,
        }
    }

    /// Set the listen port
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Serve the UI from a directory instead of the embedded page
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Allow or forbid server microphone capture
    #[must_use]
    pub fn server_microphone(mut self, enabled: bool) -> Self {
        self.server_microphone = enabled;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        ApiServer {
            state: Arc::new(ApiState {
                controller: self.controller,
                server_microphone: self.server_microphone,
            }),
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let api = Router::new()
            .merge(chat::router(self.state.clone()))
            .merge(events::router(self.state.clone()))
            .nest("/voice", voice::router(self.state.clone()));

        let router = Router::new()
            .nest("/api", api)
            .merge(health::router())
            .merge(ui::router(self.static_dir.as_ref()));

        // CORS layer for cross-origin requests from a separately hosted UI
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        tracing::info!("API server stopped");
        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
