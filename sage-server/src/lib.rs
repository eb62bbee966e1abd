//! sage-server - HTTP transport for the adaptive assessment kernel
//!
//! This crate exposes the sage-core session engine over JSON/HTTP: session
//! creation, next-question selection, answer submission, and a progress
//! snapshot. The kernel itself lives entirely in sage-core; this layer only
//! translates transport shapes and maps kernel errors to status codes.

mod error;
pub mod http;
mod state;

use tokio::net::TcpListener;

pub use error::{ApiError, ServerError};
pub use http::create_router;
pub use state::AppState;

/// The sage HTTP server
pub struct SageServer {
    config: ServerConfig,
    state: AppState,
}

impl SageServer {
    /// Create a server around existing application state
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server, binding to the configured address
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        tracing::info!("sage server listening on {}", addr);

        let router = create_router(self.state);
        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7433,
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with the specified host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the socket address string (e.g., "0.0.0.0:7433")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
