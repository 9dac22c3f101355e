use std::net::SocketAddr;

use tracing::info;

use bot_portal::ClusterClient;
use bot_portal::web::{BackendConfig, MemoryStore, PortalConfig, portal_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let addr: SocketAddr = std::env::var("PORTAL_LISTEN_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8000".to_string())
        .parse()?;

    let config = PortalConfig::from_env()?;
    let app = match BackendConfig::from_env()? {
        BackendConfig::Cluster(cluster) => {
            info!(label = %cluster.bot_label(), "Using cluster backend");
            portal_routes(config, ClusterClient::new(cluster)?, MemoryStore::new())
        }
        BackendConfig::Script(script) => {
            info!(service = %script.service_name(), "Using control script backend");
            portal_routes(config, script, MemoryStore::new())
        }
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting bot portal v{} on http://{addr}", env!("CARGO_PKG_VERSION"));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
