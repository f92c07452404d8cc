//! Session metadata records and the resolvers that produce them.
//!
//! A metadata record is the raw JSON object describing one session, exactly
//! as the remote authority sent it. Records are kept raw because the sampling
//! subsystem receives them unchanged on subscribe; typed access goes through
//! lenient accessors that return `None` for anything missing or mistyped.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error_handling::types::{ConfigError, ResolveError};
use crate::session_management::session::SessionId;

/// Wire keys of a metadata record.
pub mod keys {
    pub const ID: &str = "x_ray_id";
    pub const NAME: &str = "xray_session_name";
    pub const LOGICAL_TARGET: &str = "key_transaction_name";
    pub const REQUESTED_SAMPLE_COUNT: &str = "requested_trace_count";
    pub const DURATION: &str = "duration";
    pub const SAMPLE_PERIOD: &str = "sample_period";
    pub const SAMPLING_ENABLED: &str = "run_profiler";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionMetadata(Map<String, Value>);

impl SessionMetadata {
    /// Wraps a JSON value. Anything other than an object yields an empty record.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => SessionMetadata(map),
            _ => SessionMetadata::default(),
        }
    }

    pub fn id(&self) -> Option<SessionId> {
        self.0.get(keys::ID).and_then(SessionId::from_json)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn u64_field(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Source of metadata for sessions the registry has not seen yet.
///
/// The registry calls `resolve` at most once per reconciliation pass, with
/// only the ids it does not already track. Implementations must return a
/// record for every id or fail the whole call.
pub trait MetadataResolver: Send + Sync {
    fn resolve(&self, ids: &[SessionId]) -> Result<Vec<SessionMetadata>, ResolveError>;
}

/// Resolver answering from a fixed catalog, usually loaded from configuration.
pub struct StaticMetadataResolver {
    catalog: HashMap<SessionId, SessionMetadata>,
}

impl StaticMetadataResolver {
    /// Indexes `records` by id. Records without a readable id are rejected, and so are duplicates.
    pub fn new(records: Vec<SessionMetadata>) -> Result<Self, ConfigError> {
        let mut catalog = HashMap::with_capacity(records.len());
        for record in records {
            let id = record.id().ok_or_else(|| {
                ConfigError::NotInRange(format!(
                    "catalog entry without a valid '{}'",
                    keys::ID
                ))
            })?;
            if catalog.insert(id, record).is_some() {
                return Err(ConfigError::DuplicateSession(id));
            }
        }
        debug!("StaticMetadataResolver loaded {} record(s)", catalog.len());
        Ok(Self { catalog })
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}

impl MetadataResolver for StaticMetadataResolver {
    fn resolve(&self, ids: &[SessionId]) -> Result<Vec<SessionMetadata>, ResolveError> {
        ids.iter()
            .map(|id| {
                self.catalog
                    .get(id)
                    .cloned()
                    .ok_or(ResolveError::UnknownSession(*id))
            })
            .collect()
    }
}
