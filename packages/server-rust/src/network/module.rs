//! Gateway server module with deferred startup lifecycle.
//!
//! Implements the deferred startup pattern: `new()` creates resources,
//! `start()` binds the TCP listener, and `serve()` starts accepting
//! connections. The separation lets the application finish wiring services
//! into the gateway between `start()` and `serve()`.

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::config::NetworkConfig;
use super::handlers::{entry_handler, liveness_handler};
use super::middleware::build_http_layers;
use crate::gateway::FunctionGateway;

/// Manages the HTTP server lifecycle around a [`FunctionGateway`].
pub struct GatewayModule {
    config: NetworkConfig,
    gateway: Arc<FunctionGateway>,
    listener: Option<TcpListener>,
}

impl GatewayModule {
    /// Creates a new module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, gateway: Arc<FunctionGateway>) -> Self {
        Self {
            config,
            gateway,
            listener: None,
        }
    }

    /// Returns a shared reference to the gateway.
    #[must_use]
    pub fn gateway(&self) -> Arc<FunctionGateway> {
        Arc::clone(&self.gateway)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `POST /` and `GET /` -- the single dispatch entry point
    /// - `GET /health/live` -- liveness probe
    pub fn build_router(&self) -> Router {
        let layers = build_http_layers(&self.config);

        Router::new()
            .route("/", post(entry_handler).get(entry_handler))
            .route("/health/live", get(liveness_handler))
            .layer(layers)
            .with_state(Arc::clone(&self.gateway))
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Starts serving requests until the shutdown future completes.
    ///
    /// Consumes `self` because the listener is moved into the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a fatal I/O error.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let listener = self
            .listener
            .expect("start() must be called before serve()");

        info!(gateway = %self.gateway.name(), "serving function gateway");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("gateway server stopped");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
