use serde::Deserialize;

pub const DEFAULT_HARVEST_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_WEB_PORT: u16 = 8787;

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub harvest_interval_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            harvest_interval_secs: DEFAULT_HARVEST_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: String::from(DEFAULT_BIND_ADDRESS),
            port: DEFAULT_WEB_PORT,
        }
    }
}
