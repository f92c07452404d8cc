//! Session management core module.
//!
//! This module provides the x-ray session types and the registry that keeps
//! them reconciled against the authoritative list of active sessions.

use serde::{Deserialize, Serialize};

/// Submodule for session metadata records and resolvers.
pub mod metadata;
/// Submodule for the session value object.
pub mod session;
/// Submodule for the concurrent session registry.
pub mod session_registry;

pub use metadata::{MetadataResolver, SessionMetadata, StaticMetadataResolver};
pub use session::{Session, SessionId};
pub use session_registry::SessionRegistry;

/// Represents the current status of a session.
///
/// Variants:
/// - `Active`: The session is in the most recent authoritative list.
/// - `Inactive`: The session has left the list and is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Inactive,
}
