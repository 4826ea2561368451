use anyhow::Context;
use tandem_server::{ServerConfig, SignalHub, serve_on};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    let hub = SignalHub::new(config.retention);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(
        "Signal store listening on http://{} (retention {:?})",
        listener.local_addr()?,
        config.retention
    );

    serve_on(listener, hub).await.context("signal store server failed")
}
