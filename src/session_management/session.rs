use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::session_management::metadata::{keys, SessionMetadata};
use crate::SessionStatus;

pub const DEFAULT_SESSION_NAME: &str = "Next Session";
pub const DEFAULT_LOGICAL_TARGET: &str = "";
pub const DEFAULT_REQUESTED_SAMPLE_COUNT: u32 = 10;
pub const DEFAULT_DURATION_SECS: u64 = 600;
pub const DEFAULT_SAMPLE_PERIOD_SECS: f64 = 0.2;
pub const DEFAULT_SAMPLING_ENABLED: bool = false;

/// Identifier assigned to a session by the remote authority.
///
/// Serialized as a bare number. Deserialization goes through
/// [`SessionId::from_json`], so numeric strings are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Reads an id from a JSON value. Accepts unsigned integers and numeric strings.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(SessionId),
            Value::String(s) => s.trim().parse().ok().map(SessionId),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        SessionId::from_json(&value)
            .ok_or_else(|| de::Error::custom(format!("invalid session id: {}", value)))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One x-ray diagnostic session.
///
/// Every field except the status is fixed at construction. The status is
/// flipped by the registry only, and can be observed through any retained
/// reference, including after the session has been dropped from the registry.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    name: String,
    logical_target: String,
    requested_sample_count: u32,
    duration: Duration,
    sample_period: Duration,
    sampling_enabled: bool,
    active: AtomicBool,
    metadata: SessionMetadata,
}

impl Session {
    /// Builds a session from a metadata record, defaulting anything missing or malformed.
    ///
    /// The session starts out `Inactive`; the registry activates it once it is tracked.
    pub fn new(id: SessionId, metadata: SessionMetadata) -> Self {
        let name = metadata
            .str_field(keys::NAME)
            .unwrap_or(DEFAULT_SESSION_NAME)
            .to_string();
        let logical_target = metadata
            .str_field(keys::LOGICAL_TARGET)
            .unwrap_or(DEFAULT_LOGICAL_TARGET)
            .to_string();
        let requested_sample_count = metadata
            .u64_field(keys::REQUESTED_SAMPLE_COUNT)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_REQUESTED_SAMPLE_COUNT);
        let duration = Duration::from_secs(
            metadata
                .u64_field(keys::DURATION)
                .unwrap_or(DEFAULT_DURATION_SECS),
        );
        let sample_period = metadata
            .f64_field(keys::SAMPLE_PERIOD)
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_SAMPLE_PERIOD_SECS));
        let sampling_enabled = metadata
            .bool_field(keys::SAMPLING_ENABLED)
            .unwrap_or(DEFAULT_SAMPLING_ENABLED);

        Self {
            id,
            name,
            logical_target,
            requested_sample_count,
            duration,
            sample_period,
            sampling_enabled,
            active: AtomicBool::new(false),
            metadata,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logical_target(&self) -> &str {
        &self.logical_target
    }

    pub fn requested_sample_count(&self) -> u32 {
        self.requested_sample_count
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn sample_period(&self) -> Duration {
        self.sample_period
    }

    pub fn sampling_enabled(&self) -> bool {
        self.sampling_enabled
    }

    /// The record this session was built from, as received.
    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_active() {
            SessionStatus::Active
        } else {
            SessionStatus::Inactive
        }
    }

    pub(crate) fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}
