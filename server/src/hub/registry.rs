use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::error::HubError;

/// Cancellation handle for one subscriber's forwarding task.
///
/// `epoch` is unique per subscription, so a task that ends late can tell
/// whether the registry entry under its session id is still its own.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub token: CancellationToken,
    pub epoch: u64,
}

/// Active sessions: session id -> forwarding task handle.
///
/// All mutations for a given key are serialized by the map's shard lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session. Fails without touching the existing entry when the
    /// id is already present.
    pub fn add(&self, session_id: &str, handle: SessionHandle) -> Result<(), HubError> {
        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(_) => Err(HubError::DuplicateSession(session_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    /// Remove a session. Returns `None` when it was not present.
    pub fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.remove(session_id).map(|(_, handle)| handle)
    }

    /// Remove a session only if it still belongs to the given subscription.
    pub fn remove_if_epoch(&self, session_id: &str, epoch: u64) -> bool {
        self.sessions
            .remove_if(session_id, |_, handle| handle.epoch == epoch)
            .is_some()
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }
}
