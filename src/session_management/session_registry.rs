use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::error_handling::types::SessionError;
use crate::sampling::coordinator::SamplingCoordinator;
use crate::sampling::types::SampleSet;
use crate::session_management::metadata::{MetadataResolver, SessionMetadata};
use crate::session_management::session::{Session, SessionId};

struct TrackedSession {
    session: Arc<Session>,
    /// Set only when `subscribe` succeeded; gates the matching `unsubscribe`.
    subscribed: bool,
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<SessionId, TrackedSession>,
    /// First active session per logical target.
    target_index: HashMap<String, SessionId>,
}

impl RegistryState {
    fn insert(&mut self, tracked: TrackedSession) {
        let id = tracked.session.id();
        self.target_index
            .entry(tracked.session.logical_target().to_string())
            .or_insert(id);
        self.sessions.insert(id, tracked);
    }

    fn remove(&mut self, id: SessionId) -> Option<TrackedSession> {
        let tracked = self.sessions.remove(&id)?;
        let target = tracked.session.logical_target();
        if self.target_index.get(target) == Some(&id) {
            self.target_index.remove(target);
            let replacement = self
                .sessions
                .values()
                .filter(|t| t.session.logical_target() == target)
                .map(|t| t.session.id())
                .min();
            if let Some(other) = replacement {
                self.target_index.insert(target.to_string(), other);
            }
        }
        Some(tracked)
    }
}

/// Registry of active x-ray sessions, reconciled against the authoritative list.
///
/// One lock guards the session map and the target index together. `reconcile`
/// holds it for its whole body, collaborator calls included, so readers only
/// ever see the state before or after a pass. Sessions are handed out as
/// `Arc<Session>`: a caller holding one keeps observing its status after the
/// registry has dropped it.
///
/// # Fields Overview
///
/// - `state`: session map and target index
/// - `resolver`: fetches metadata for sessions seen for the first time
/// - `coordinator`: the sampling subsystem driven on activation and removal
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
    resolver: Arc<dyn MetadataResolver>,
    coordinator: Arc<dyn SamplingCoordinator>,
}

impl SessionRegistry {
    pub fn new(
        resolver: Arc<dyn MetadataResolver>,
        coordinator: Arc<dyn SamplingCoordinator>,
    ) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            resolver,
            coordinator,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Brings the registry in line with `active_ids`.
    ///
    /// Unknown ids are resolved in a single batch, built into sessions,
    /// subscribed when sampling is enabled and marked active. Tracked ids
    /// missing from `active_ids` are marked inactive, unsubscribed and
    /// dropped. Ids tracked and still listed are left alone.
    ///
    /// # Errors
    /// Returns the resolution error when the new batch could not be resolved.
    /// In that case none of the new sessions are registered, but vanished
    /// sessions have still been removed.
    pub fn reconcile(&self, active_ids: &[SessionId]) -> Result<(), SessionError> {
        let mut state = self.lock_state();

        let mut listed = HashSet::with_capacity(active_ids.len());
        let new_ids: Vec<SessionId> = active_ids
            .iter()
            .copied()
            .filter(|id| listed.insert(*id))
            .filter(|id| !state.sessions.contains_key(id))
            .collect();

        let added = if new_ids.is_empty() {
            Ok(0)
        } else {
            self.add_sessions(&mut state, &new_ids)
        };
        let removed = self.remove_vanished(&mut state, &listed);

        debug!(
            "Reconciled {} listed session(s): {} removed, {} tracked",
            listed.len(),
            removed,
            state.sessions.len()
        );
        added.map(|_| ())
    }

    fn add_sessions(
        &self,
        state: &mut RegistryState,
        new_ids: &[SessionId],
    ) -> Result<usize, SessionError> {
        let records = self.resolver.resolve(new_ids)?;

        let requested: HashSet<SessionId> = new_ids.iter().copied().collect();
        let mut by_id: HashMap<SessionId, SessionMetadata> = HashMap::with_capacity(records.len());
        for record in records {
            match record.id() {
                Some(id) if requested.contains(&id) => {
                    by_id.entry(id).or_insert(record);
                }
                Some(id) => warn!("[{}] Ignoring metadata that was not requested", id),
                None => warn!("Ignoring metadata record without a session id"),
            }
        }

        let missing: Vec<SessionId> = new_ids
            .iter()
            .copied()
            .filter(|id| !by_id.contains_key(id))
            .collect();
        if !missing.is_empty() {
            return Err(SessionError::MetadataIncomplete(missing));
        }

        for id in new_ids {
            let Some(metadata) = by_id.remove(id) else {
                continue;
            };
            let session = Arc::new(Session::new(*id, metadata));
            let subscribed = session.sampling_enabled() && self.subscribe(&session);
            session.activate();
            info!(
                "[{}] Activated x-ray session '{}' for '{}'",
                id,
                session.name(),
                session.logical_target()
            );
            state.insert(TrackedSession {
                session,
                subscribed,
            });
        }
        Ok(new_ids.len())
    }

    fn remove_vanished(&self, state: &mut RegistryState, listed: &HashSet<SessionId>) -> usize {
        let mut vanished: Vec<SessionId> = state
            .sessions
            .keys()
            .copied()
            .filter(|id| !listed.contains(id))
            .collect();
        vanished.sort();

        for id in &vanished {
            let Some(tracked) = state.sessions.get(id) else {
                continue;
            };
            tracked.session.deactivate();
            if tracked.subscribed {
                self.unsubscribe(&tracked.session);
            }
            state.remove(*id);
            info!("[{}] Deactivated x-ray session", id);
        }
        vanished.len()
    }

    fn subscribe(&self, session: &Session) -> bool {
        match self
            .coordinator
            .subscribe(session.logical_target(), session.metadata())
        {
            Ok(()) => true,
            Err(e) => {
                warn!("[{}] Subscribe failed: {}", session.id(), e);
                false
            }
        }
    }

    fn unsubscribe(&self, session: &Session) {
        if let Err(e) = self.coordinator.unsubscribe(session.logical_target()) {
            warn!("[{}] Unsubscribe failed: {}", session.id(), e);
        }
    }

    pub fn lookup(&self, id: SessionId) -> Option<Arc<Session>> {
        self.lock_state()
            .sessions
            .get(&id)
            .map(|tracked| Arc::clone(&tracked.session))
    }

    pub fn includes(&self, id: SessionId) -> bool {
        self.lock_state().sessions.contains_key(&id)
    }

    /// Id of the active session targeting `target`, if any.
    pub fn session_id_for_target(&self, target: &str) -> Option<SessionId> {
        self.lock_state().target_index.get(target).copied()
    }

    /// Active sessions ordered by id.
    pub fn active_sessions(&self) -> Vec<Arc<Session>> {
        let mut sessions: Vec<Arc<Session>> = self
            .lock_state()
            .sessions
            .values()
            .map(|tracked| Arc::clone(&tracked.session))
            .collect();
        sessions.sort_by_key(|session| session.id());
        sessions
    }

    pub fn len(&self) -> usize {
        self.lock_state().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().sessions.is_empty()
    }

    /// Collects the samples of every active session, in no particular order.
    ///
    /// The lock is only held to snapshot the targets. A failed harvest is
    /// logged and skipped.
    pub fn harvest_all(&self) -> Vec<SampleSet> {
        let targets: Vec<(SessionId, String)> = self
            .lock_state()
            .sessions
            .values()
            .map(|tracked| {
                (
                    tracked.session.id(),
                    tracked.session.logical_target().to_string(),
                )
            })
            .collect();

        targets
            .into_iter()
            .filter_map(|(id, target)| match self.coordinator.harvest(&target) {
                Ok(set) => Some(set),
                Err(e) => {
                    warn!("[{}] Harvest failed: {}", id, e);
                    None
                }
            })
            .collect()
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let state = self.lock_state();
        for (target, id) in &state.target_index {
            let tracked = state
                .sessions
                .get(id)
                .unwrap_or_else(|| panic!("index points at untracked session {}", id));
            assert_eq!(tracked.session.logical_target(), target);
            assert!(tracked.session.is_active());
        }
        for tracked in state.sessions.values() {
            assert!(tracked.session.is_active());
            assert!(state
                .target_index
                .contains_key(tracked.session.logical_target()));
        }
    }
}
