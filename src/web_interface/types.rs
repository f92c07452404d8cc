use serde::{Deserialize, Serialize};

use crate::session_management::{Session, SessionId, SessionStatus};

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: SessionId,
    pub name: String,
    pub key_transaction_name: String,
    pub requested_trace_count: u32,
    pub duration_secs: u64,
    pub sample_period_secs: f64,
    pub run_profiler: bool,
    pub status: SessionStatus,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id(),
            name: session.name().to_string(),
            key_transaction_name: session.logical_target().to_string(),
            requested_trace_count: session.requested_sample_count(),
            duration_secs: session.duration().as_secs(),
            sample_period_secs: session.sample_period().as_secs_f64(),
            run_profiler: session.sampling_enabled(),
            status: session.status(),
        }
    }
}

/// Body of `POST /samples`.
#[derive(Debug, Deserialize)]
pub struct SampleRequest {
    pub transaction_name: String,
    #[serde(default)]
    pub stack: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SampleResponse {
    pub session_id: Option<SessionId>,
    pub recorded: bool,
}
