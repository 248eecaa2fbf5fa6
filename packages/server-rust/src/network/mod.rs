//! HTTP transport wiring for the gateway.
//!
//! The gateway core is transport-independent; this module binds it to axum:
//! configuration, the tower-http middleware stack, the entry handler, and
//! the deferred-startup server module.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;

pub use config::NetworkConfig;
pub use handlers::{entry_handler, liveness_handler};
pub use middleware::build_http_layers;
pub use module::GatewayModule;
