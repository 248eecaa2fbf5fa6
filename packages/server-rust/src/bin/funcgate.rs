//! Demo gateway binary: serves a minimal `status` service behind the single
//! dispatch endpoint.
//!
//! ```text
//! funcgate --port 8080
//! curl 'localhost:8080/?cmd=status.get_status'
//! ```

use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use funcgate_server::network::{GatewayModule, NetworkConfig};
use funcgate_server::{action, send_result, FunctionGateway, FunctionService};

#[derive(Debug, Parser)]
#[command(name = "funcgate", about = "Single-endpoint function gateway")]
struct Args {
    /// Bind address.
    #[arg(long, env = "FUNCGATE_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on (0 = OS-assigned).
    #[arg(long, env = "FUNCGATE_PORT", default_value_t = 8080)]
    port: u16,

    /// Log filter, e.g. `info` or `funcgate_server=debug`.
    #[arg(long, env = "FUNCGATE_LOG", default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log))
        .init();

    let mut service = FunctionService::new("status");
    service.register_action(
        "get_status",
        None,
        action(|request| async move {
            let correlation_id = request.correlation_id();
            send_result(
                &correlation_id,
                Ok(Some(json!({
                    "name": "funcgate",
                    "status": "ok",
                }))),
            )
        }),
    )?;

    let gateway = Arc::new(FunctionGateway::new("funcgate", "Demo function gateway"));
    gateway.add_service(service);

    let config = NetworkConfig {
        host: args.host,
        port: args.port,
        ..NetworkConfig::default()
    };

    let mut module = GatewayModule::new(config, gateway);
    let port = module.start().await?;
    info!(port, "funcgate ready, press Ctrl-C to stop");

    module
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
