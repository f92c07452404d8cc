use crate::error_handling::types::SamplingError;
use crate::sampling::types::SampleSet;
use crate::session_management::metadata::SessionMetadata;

/// Contract of the sampling subsystem, keyed by logical target name.
///
/// Calls may block on I/O. Implementations must be shareable across the
/// reconciliation, request and harvest threads.
pub trait SamplingCoordinator: Send + Sync {
    /// Starts collecting for `target`, configured from the session's raw metadata.
    fn subscribe(&self, target: &str, metadata: &SessionMetadata) -> Result<(), SamplingError>;

    /// Stops collecting for `target` and discards anything not yet harvested.
    fn unsubscribe(&self, target: &str) -> Result<(), SamplingError>;

    /// Returns and clears what was collected for `target`.
    fn harvest(&self, target: &str) -> Result<SampleSet, SamplingError>;
}
