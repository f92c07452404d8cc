//! Data handed out by the sampling subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single captured stack for one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub taken_at: DateTime<Utc>,
    /// Frames, innermost first.
    pub stack: Vec<String>,
}

impl Sample {
    pub fn now(stack: Vec<String>) -> Self {
        Self {
            taken_at: Utc::now(),
            stack,
        }
    }
}

/// Everything collected for one logical target since the previous harvest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    pub target: String,
    pub samples: Vec<Sample>,
    pub harvested_at: DateTime<Utc>,
}

impl SampleSet {
    pub fn empty(target: &str) -> Self {
        Self {
            target: target.to_string(),
            samples: Vec::new(),
            harvested_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
