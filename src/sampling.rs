//! Sampling subsystem boundary.
//!
//! The registry only talks to sampling through the [`SamplingCoordinator`]
//! trait. [`SampleCollector`] is the in-process implementation used by the
//! agent: request handlers record stack samples for subscribed targets and
//! the harvest pass drains them into [`SampleSet`]s.

pub mod coordinator;
pub mod sample_collector;
pub mod types;

pub use coordinator::SamplingCoordinator;
pub use sample_collector::SampleCollector;
pub use types::{Sample, SampleSet};
