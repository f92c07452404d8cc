use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error_handling::types::CommandError;
use crate::session_management::session::SessionId;

/// The authoritative list of x-ray sessions that should be active right now.
///
/// An empty list is valid and deactivates everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveSessionsCommand {
    #[serde(alias = "active_ids")]
    pub xray_ids: Vec<SessionId>,
}

impl ActiveSessionsCommand {
    pub fn new(xray_ids: Vec<SessionId>) -> Self {
        Self { xray_ids }
    }

    pub fn from_json(payload: &str) -> Result<Self, CommandError> {
        Ok(serde_json::from_str(payload)?)
    }

    pub fn from_value(payload: Value) -> Result<Self, CommandError> {
        Ok(serde_json::from_value(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_xray_ids() {
        let command = ActiveSessionsCommand::from_json(r#"{"xray_ids": [123, 42]}"#).unwrap();
        assert_eq!(command.xray_ids, vec![SessionId(123), SessionId(42)]);
    }

    #[test]
    fn test_accepts_active_ids_alias() {
        let command = ActiveSessionsCommand::from_json(r#"{"active_ids": []}"#).unwrap();
        assert!(command.xray_ids.is_empty());
    }

    #[test]
    fn test_parses_from_value() {
        let command = ActiveSessionsCommand::from_value(serde_json::json!({"xray_ids": [7]})).unwrap();
        assert_eq!(command, ActiveSessionsCommand::new(vec![SessionId(7)]));
    }

    #[test]
    fn test_accepts_numeric_string_ids() {
        let command = ActiveSessionsCommand::from_json(r#"{"xray_ids": ["123", 42]}"#).unwrap();
        assert_eq!(command.xray_ids, vec![SessionId(123), SessionId(42)]);
    }

    #[test]
    fn test_rejects_non_numeric_ids() {
        let result = ActiveSessionsCommand::from_json(r#"{"xray_ids": ["abc"]}"#);
        assert!(matches!(result, Err(CommandError::Malformed(_))));

        let result = ActiveSessionsCommand::from_json(r#"{"xray_ids": [-1]}"#);
        assert!(matches!(result, Err(CommandError::Malformed(_))));
    }

    #[test]
    fn test_rejects_malformed_payload() {
        let result = ActiveSessionsCommand::from_json(r#"{"xray_ids": "all"}"#);
        assert!(matches!(result, Err(CommandError::Malformed(_))));

        let result = ActiveSessionsCommand::from_json("not json");
        assert!(matches!(result, Err(CommandError::Malformed(_))));
    }
}
