use std::fmt;

use crate::session_management::session::SessionId;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadIPFormatting(String),
    NotInRange(String),
    DuplicateSession(SessionId),
    EnvVar(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadIPFormatting(e) => write!(f, "IP formatting error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::DuplicateSession(id) => {
                write!(f, "Session {} is declared more than once in the catalog", id)
            }
            ConfigError::EnvVar(e) => write!(f, "Environment override error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::TomlError(err.to_string())
    }
}

/// Failure reported by a metadata resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// The remote side could not be reached or answered with garbage.
    Transport(String),
    /// The resolver has no metadata for this session.
    UnknownSession(SessionId),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Transport(e) => write!(f, "Metadata transport error: {}", e),
            ResolveError::UnknownSession(id) => write!(f, "No metadata for session {}", id),
        }
    }
}

impl std::error::Error for ResolveError {}

#[derive(Debug, Clone, PartialEq)]
pub enum SamplingError {
    NotSubscribed(String),
    Unavailable(String),
}

impl fmt::Display for SamplingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingError::NotSubscribed(target) => write!(f, "No subscription for '{}'", target),
            SamplingError::Unavailable(e) => write!(f, "Sampling subsystem unavailable: {}", e),
        }
    }
}

impl std::error::Error for SamplingError {}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    Resolution(ResolveError),
    /// The resolver answered, but some requested sessions had no record.
    MetadataIncomplete(Vec<SessionId>),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Resolution(e) => write!(f, "Session resolution failed: {}", e),
            SessionError::MetadataIncomplete(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, "Metadata missing for session(s): {}", ids.join(", "))
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ResolveError> for SessionError {
    fn from(err: ResolveError) -> Self {
        SessionError::Resolution(err)
    }
}

#[derive(Debug)]
pub enum CommandError {
    Malformed(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Malformed(e) => write!(f, "Malformed command payload: {}", e),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        CommandError::Malformed(err.to_string())
    }
}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Unable to bind web interface: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    CommandError(CommandError),
    SessionError(SessionError),
    WebError(WebError),
    InitializationFailed(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::CommandError(e) => write!(f, "Command error: {}", e),
            ControllerError::SessionError(e) => write!(f, "Session error: {}", e),
            ControllerError::WebError(e) => write!(f, "Web interface error: {}", e),
            ControllerError::InitializationFailed(e) => write!(f, "Initialization failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<CommandError> for ControllerError {
    fn from(err: CommandError) -> Self {
        ControllerError::CommandError(err)
    }
}

impl From<SessionError> for ControllerError {
    fn from(err: SessionError) -> Self {
        ControllerError::SessionError(err)
    }
}

impl From<WebError> for ControllerError {
    fn from(err: WebError) -> Self {
        ControllerError::WebError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_incomplete_lists_every_id() {
        let err = SessionError::MetadataIncomplete(vec![SessionId(7), SessionId(42)]);
        assert_eq!(err.to_string(), "Metadata missing for session(s): 7, 42");
    }

    #[test]
    fn test_controller_error_wraps_session_error() {
        let err: ControllerError =
            SessionError::from(ResolveError::Transport("timeout".into())).into();
        assert_eq!(
            err.to_string(),
            "Session error: Session resolution failed: Metadata transport error: timeout"
        );
    }
}
