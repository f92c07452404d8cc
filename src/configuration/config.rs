use super::types::*;
use crate::error_handling::types::ConfigError;
use crate::session_management::metadata::{keys, SessionMetadata};
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Overrides `web.port` when set.
pub const ENV_WEB_PORT: &str = "XRAY_WEB_PORT";
/// Overrides `agent.harvest_interval_secs` when set.
pub const ENV_HARVEST_INTERVAL_SECS: &str = "XRAY_HARVEST_INTERVAL_SECS";

/// Agent configuration structure that defines all runtime parameters.
///
/// The configuration is read from a TOML file. Every section is optional and
/// falls back to its defaults.
///
/// # Examples
///
/// ```
/// use xray::configuration::Config;
///
/// let config = Config::from_toml("[web]\nport = 9000\n").unwrap();
/// assert_eq!(config.web.port, 9000);
/// assert!(config.sessions.is_empty());
/// ```
///
/// # Fields Overview
///
/// - `agent`: harvest scheduling
/// - `web`: HTTP interface through which commands and samples arrive
/// - `sessions`: static metadata catalog answering resolver requests, one
///   `[[sessions]]` table per x-ray session using the wire keys
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub web: WebConfig,
    pub sessions: Vec<SessionMetadata>,
}

impl Config {
    /// Loads, overrides from the environment and validates a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file and applies environment overrides without
    /// validating, so callers can layer further overrides first.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Reading configuration from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let mut config = Self::from_toml(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(port) = std::env::var(ENV_WEB_PORT) {
            self.web.port = port
                .trim()
                .parse()
                .map_err(|e| ConfigError::EnvVar(format!("{}={}: {}", ENV_WEB_PORT, port, e)))?;
            debug!("web.port overridden to {}", self.web.port);
        }
        if let Ok(secs) = std::env::var(ENV_HARVEST_INTERVAL_SECS) {
            self.agent.harvest_interval_secs = secs.trim().parse().map_err(|e| {
                ConfigError::EnvVar(format!("{}={}: {}", ENV_HARVEST_INTERVAL_SECS, secs, e))
            })?;
            debug!(
                "agent.harvest_interval_secs overridden to {}",
                self.agent.harvest_interval_secs
            );
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.harvest_interval_secs == 0 {
            return Err(ConfigError::NotInRange(
                "agent.harvest_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.web.enabled {
            self.web_address()?;
            if self.web.port == 0 {
                return Err(ConfigError::NotInRange(
                    "web.port must be set when the web interface is enabled".to_string(),
                ));
            }
        }

        let mut seen = HashSet::with_capacity(self.sessions.len());
        for record in &self.sessions {
            let id = record.id().ok_or_else(|| {
                ConfigError::NotInRange(format!("[[sessions]] entry without a valid '{}'", keys::ID))
            })?;
            if !seen.insert(id) {
                return Err(ConfigError::DuplicateSession(id));
            }
        }
        Ok(())
    }

    pub fn web_address(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .web
            .bind_address
            .parse()
            .map_err(|_| ConfigError::BadIPFormatting(self.web.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.web.port))
    }

    pub fn harvest_interval(&self) -> Duration {
        Duration::from_secs(self.agent.harvest_interval_secs)
    }
}
