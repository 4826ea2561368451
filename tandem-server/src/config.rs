use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

pub const SIGNAL_ADDR_ENV: &str = "TANDEM_SIGNAL_ADDR";
pub const SIGNAL_RETENTION_ENV: &str = "TANDEM_SIGNAL_RETENTION_SECS";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_RETENTION: Duration = Duration::from_secs(60);

/// Settings of the signal store service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// How long a signal stays readable after it was published.
    pub retention: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            retention: DEFAULT_RETENTION,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var(SIGNAL_ADDR_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid {SIGNAL_ADDR_ENV} value {bind_addr}"))?;

        let retention = match std::env::var(SIGNAL_RETENTION_ENV) {
            Ok(secs) => Duration::from_secs(
                secs.parse::<u64>()
                    .with_context(|| format!("invalid {SIGNAL_RETENTION_ENV} value {secs}"))?,
            ),
            Err(_) => DEFAULT_RETENTION,
        };

        Ok(Self {
            bind_addr,
            retention,
        })
    }
}
