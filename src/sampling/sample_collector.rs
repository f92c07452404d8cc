use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, trace};

use crate::error_handling::types::SamplingError;
use crate::sampling::coordinator::SamplingCoordinator;
use crate::sampling::types::{Sample, SampleSet};
use crate::session_management::metadata::{keys, SessionMetadata};
use crate::session_management::session::{
    DEFAULT_REQUESTED_SAMPLE_COUNT, DEFAULT_SAMPLE_PERIOD_SECS,
};

struct Subscription {
    subscribers: usize,
    capacity: usize,
    period: Duration,
    last_taken: Option<Instant>,
    samples: Vec<Sample>,
}

impl Subscription {
    fn from_metadata(metadata: &SessionMetadata) -> Self {
        let capacity = metadata
            .u64_field(keys::REQUESTED_SAMPLE_COUNT)
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_REQUESTED_SAMPLE_COUNT as usize);
        let period = metadata
            .f64_field(keys::SAMPLE_PERIOD)
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_SAMPLE_PERIOD_SECS));
        Self {
            subscribers: 1,
            capacity,
            period,
            last_taken: None,
            samples: Vec::new(),
        }
    }

    fn due(&self, now: Instant) -> bool {
        match self.last_taken {
            Some(last) => now.duration_since(last) >= self.period,
            None => true,
        }
    }
}

/// In-process sampling subsystem.
///
/// Each subscribed target gets a buffer bounded by the session's requested
/// sample count. Samples offered more often than the session's sample period
/// are skipped. Sessions sharing a target share its buffer; it is dropped
/// when the last of them unsubscribes. Unsubscribing an unknown target is a
/// no-op.
pub struct SampleCollector {
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

impl SampleCollector {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Offers a stack sample for `target`. Returns `true` when it was kept.
    pub fn record(&self, target: &str, stack: Vec<String>) -> bool {
        let now = Instant::now();
        let mut subscriptions = self.lock();
        let Some(subscription) = subscriptions.get_mut(target) else {
            return false;
        };
        if subscription.samples.len() >= subscription.capacity || !subscription.due(now) {
            trace!("Skipping sample for '{}'", target);
            return false;
        }
        subscription.last_taken = Some(now);
        subscription.samples.push(Sample::now(stack));
        true
    }

    pub fn is_subscribed(&self, target: &str) -> bool {
        self.lock().contains_key(target)
    }

    pub fn subscription_count(&self) -> usize {
        self.lock().len()
    }
}

impl Default for SampleCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplingCoordinator for SampleCollector {
    fn subscribe(&self, target: &str, metadata: &SessionMetadata) -> Result<(), SamplingError> {
        let mut subscriptions = self.lock();
        if let Some(existing) = subscriptions.get_mut(target) {
            existing.subscribers += 1;
            debug!(
                "Joining subscription for '{}' ({} subscriber(s))",
                target, existing.subscribers
            );
            return Ok(());
        }
        let subscription = Subscription::from_metadata(metadata);
        debug!(
            "Subscribing '{}' (capacity {}, period {:?})",
            target, subscription.capacity, subscription.period
        );
        subscriptions.insert(target.to_string(), subscription);
        Ok(())
    }

    fn unsubscribe(&self, target: &str) -> Result<(), SamplingError> {
        let mut subscriptions = self.lock();
        let Some(subscription) = subscriptions.get_mut(target) else {
            return Ok(());
        };
        subscription.subscribers -= 1;
        if subscription.subscribers == 0 {
            subscriptions.remove(target);
            debug!("Unsubscribed '{}'", target);
        } else {
            debug!(
                "Left subscription for '{}' ({} subscriber(s) remain)",
                target, subscription.subscribers
            );
        }
        Ok(())
    }

    fn harvest(&self, target: &str) -> Result<SampleSet, SamplingError> {
        let mut subscriptions = self.lock();
        let samples = match subscriptions.get_mut(target) {
            Some(subscription) => std::mem::take(&mut subscription.samples),
            None => Vec::new(),
        };
        debug!("Harvested {} sample(s) for '{}'", samples.len(), target);
        Ok(SampleSet {
            target: target.to_string(),
            samples,
            harvested_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(count: u64, period: f64) -> SessionMetadata {
        SessionMetadata::from_json(json!({
            "requested_trace_count": count,
            "sample_period": period,
        }))
    }

    fn stack(frame: &str) -> Vec<String> {
        vec![frame.to_string()]
    }

    #[test]
    fn test_record_requires_subscription() {
        let collector = SampleCollector::new();
        assert!(!collector.record("foo", stack("a")));

        collector.subscribe("foo", &metadata(5, 0.000001)).unwrap();
        assert!(collector.record("foo", stack("a")));
        assert!(collector.is_subscribed("foo"));
    }

    #[test]
    fn test_buffer_is_bounded_by_requested_count() {
        let collector = SampleCollector::new();
        collector.subscribe("foo", &metadata(2, 0.000001)).unwrap();

        let mut kept = 0;
        for _ in 0..10 {
            std::thread::sleep(Duration::from_millis(1));
            if collector.record("foo", stack("frame")) {
                kept += 1;
            }
        }
        assert_eq!(kept, 2);
    }

    #[test]
    fn test_samples_inside_period_are_skipped() {
        let collector = SampleCollector::new();
        collector.subscribe("foo", &metadata(10, 3600.0)).unwrap();
        assert!(collector.record("foo", stack("first")));
        assert!(!collector.record("foo", stack("second")));
    }

    #[test]
    fn test_harvest_drains_buffer() {
        let collector = SampleCollector::new();
        collector.subscribe("foo", &metadata(10, 0.000001)).unwrap();
        collector.record("foo", stack("a"));

        let first = collector.harvest("foo").unwrap();
        assert_eq!(first.target, "foo");
        assert_eq!(first.len(), 1);
        assert_eq!(first.samples[0].stack, stack("a"));

        let second = collector.harvest("foo").unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_harvest_of_unknown_target_is_empty() {
        let collector = SampleCollector::new();
        let set = collector.harvest("nothing").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_unsubscribe_unknown_target_is_noop() {
        let collector = SampleCollector::new();
        assert!(collector.unsubscribe("nothing").is_ok());

        collector.subscribe("foo", &SessionMetadata::default()).unwrap();
        collector.unsubscribe("foo").unwrap();
        assert_eq!(collector.subscription_count(), 0);
    }

    #[test]
    fn test_shared_target_survives_one_unsubscribe() {
        let collector = SampleCollector::new();
        collector.subscribe("foo", &metadata(10, 0.000001)).unwrap();
        assert!(collector.record("foo", stack("first")));

        collector.subscribe("foo", &metadata(10, 0.000001)).unwrap();
        collector.unsubscribe("foo").unwrap();
        assert!(collector.is_subscribed("foo"));

        let set = collector.harvest("foo").unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.samples[0].stack, stack("first"));

        collector.unsubscribe("foo").unwrap();
        assert!(!collector.is_subscribed("foo"));
        assert!(collector.unsubscribe("foo").is_ok());
    }
}
