use serde::Deserialize;

use crate::hub::HubConfig;

/// Top-level configuration settings for the application.
///
/// Includes settings for the websocket server, the broadcast hub and logging.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub hub: HubSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the server will bind to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Configuration settings for the broadcast hub and the peers it accepts.
#[derive(Debug, Deserialize, Clone)]
pub struct HubSettings {
    /// Capacity of the hub's broadcast and unregister queues.
    pub inbox_capacity: usize,
    /// Close connections passed to `unregister` even if they were never registered.
    pub close_unknown: bool,
    pub max_connections: usize,
    /// Topics every new peer starts subscribed to.
    pub default_topics: Vec<String>,
    /// Interval of the heartbeat broadcast; 0 disables it.
    pub heartbeat_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub hub: Option<PartialHubSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialHubSettings {
    pub inbox_capacity: Option<usize>,
    pub close_unknown: Option<bool>,
    pub max_connections: Option<usize>,
    pub default_topics: Option<Vec<String>>,
    pub heartbeat_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            inbox_capacity: HubConfig::DEFAULT_INBOX_CAPACITY,
            close_unknown: true,
            max_connections: 1000,
            default_topics: Vec::new(),
            heartbeat_secs: 0,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl HubSettings {
    /// Hub options derived from these settings, using the default error handler.
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            close_unknown: self.close_unknown,
            inbox_capacity: self.inbox_capacity,
            ..HubConfig::default()
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from [`Settings::default`].
    pub fn merge_defaults(self) -> Settings {
        let default = Settings::default();
        let server = self.server.unwrap_or_default();
        let hub = self.hub.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
            },
            hub: HubSettings {
                inbox_capacity: hub.inbox_capacity.unwrap_or(default.hub.inbox_capacity),
                close_unknown: hub.close_unknown.unwrap_or(default.hub.close_unknown),
                max_connections: hub.max_connections.unwrap_or(default.hub.max_connections),
                default_topics: hub.default_topics.unwrap_or(default.hub.default_topics),
                heartbeat_secs: hub.heartbeat_secs.unwrap_or(default.hub.heartbeat_secs),
            },
            log: LogSettings {
                level: log.level.unwrap_or(default.log.level),
            },
        }
    }
}
