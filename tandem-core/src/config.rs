use crate::utils::{DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const POLL_INTERVAL_ENV: &str = "TANDEM_POLL_INTERVAL_MS";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_CHANNEL_LABEL: &str = "chat";
const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Settings for the peer transport behind a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_owned(), DEFAULT_STUN_ADDR_2.to_owned()],
                username: None,
                credential: None,
            }],
        }
    }
}

/// Settings for one data channel manager.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Label used when this side creates the channel.
    pub label: String,
    /// Upper bound on how long `initialize` waits for the channel to open.
    pub open_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_CHANNEL_LABEL.to_owned(),
            open_timeout: DEFAULT_OPEN_TIMEOUT,
        }
    }
}

/// Settings for the signaling bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Period of the polling timer.
    pub poll_interval: Duration,
    /// Identity offered to the store on create/join. The store may assign another.
    pub identity: Option<String>,
    /// Send a `leave` signal before leaving a room.
    pub send_leave_notice: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            identity: None,
            send_leave_notice: true,
        }
    }
}

impl BridgeConfig {
    /// Defaults with the poll interval taken from `TANDEM_POLL_INTERVAL_MS` when set.
    pub fn from_env() -> Self {
        let poll_interval_ms = std::env::var(POLL_INTERVAL_ENV)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);

        Self {
            poll_interval: Duration::from_millis(poll_interval_ms),
            ..Self::default()
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}
