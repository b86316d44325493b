use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use events::Event;
use log::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

/// Unique identifier for a relay session (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a single non-blocking enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Enqueued,
    /// The queue was full; the event was dropped for this session only
    Dropped,
    /// The session's receiver is gone
    Closed,
}

/// The registry's view of one live session: the producing end of its queue
/// plus the signals used to force it closed.
#[derive(Debug)]
pub struct SessionHandle {
    sender: mpsc::Sender<Event>,
    closing: CancellationToken,
    degraded: AtomicBool,
}

impl SessionHandle {
    pub fn new(sender: mpsc::Sender<Event>, closing: CancellationToken) -> Self {
        Self {
            sender,
            closing,
            degraded: AtomicBool::new(false),
        }
    }

    /// Attempt to enqueue without waiting.
    pub fn try_deliver(&self, event: &Event) -> Delivery {
        match self.sender.try_send(event.clone()) {
            Ok(()) => Delivery::Enqueued,
            Err(TrySendError::Full(_)) => Delivery::Dropped,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Mark this session as a slow consumer and ask it to close.
    /// Returns `true` only for the call that flipped the flag.
    pub fn mark_degraded(&self) -> bool {
        let newly_degraded = !self.degraded.swap(true, Ordering::AcqRel);
        self.closing.cancel();
        newly_degraded
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub fn is_closing(&self) -> bool {
        self.closing.is_cancelled()
    }

    pub fn closing(&self) -> &CancellationToken {
        &self.closing
    }
}

/// Registry of live relay sessions.
///
/// Register and unregister are O(1) and safe to call from any task while
/// another task is iterating with `for_each`.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Register a session. Returns `false`, leaving the existing entry in
    /// place, if the id is already registered.
    pub fn register(&self, session_id: SessionId, handle: Arc<SessionHandle>) -> bool {
        match self.sessions.entry(session_id) {
            Entry::Occupied(entry) => {
                warn!("Relay session {} is already registered", entry.key());
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(handle);
                true
            }
        }
    }

    /// Unregister a session - O(1). Idempotent.
    pub fn unregister(&self, session_id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.remove(session_id).map(|(_, handle)| handle)
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Visit every live session.
    ///
    /// Iterates over a snapshot taken up front, so no map lock is held while
    /// `f` runs and `f` may itself register or unregister sessions. Sessions
    /// that have started closing since the snapshot are skipped.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&SessionId, &SessionHandle),
    {
        let snapshot: Vec<(SessionId, Arc<SessionHandle>)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        for (session_id, handle) in snapshot {
            if handle.is_closing() {
                continue;
            }
            f(&session_id, &handle);
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(capacity: usize) -> (Arc<SessionHandle>, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Arc::new(SessionHandle::new(tx, CancellationToken::new())),
            rx,
        )
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn register_and_unregister() {
        let registry = SessionRegistry::new();
        let (h1, _rx1) = handle(1);
        let (h2, _rx2) = handle(1);
        let id1 = SessionId::new();
        let id2 = SessionId::new();

        assert!(registry.register(id1.clone(), h1));
        assert!(registry.register(id2.clone(), h2));
        assert_eq!(registry.len(), 2);

        assert!(registry.unregister(&id1).is_some());
        assert!(registry.unregister(&id1).is_none());
        assert!(!registry.contains(&id1));
        assert!(registry.contains(&id2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_rejects_duplicate_ids() {
        let registry = SessionRegistry::new();
        let (h1, _rx1) = handle(1);
        let (h2, _rx2) = handle(1);
        let id = SessionId::new();

        assert!(registry.register(id.clone(), h1));
        assert!(!registry.register(id, h2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn for_each_tolerates_removal_during_iteration() {
        let registry = SessionRegistry::new();
        let mut receivers = Vec::new();
        let mut ids = Vec::new();
        for _ in 0..4 {
            let (h, rx) = handle(1);
            let id = SessionId::new();
            registry.register(id.clone(), h);
            receivers.push(rx);
            ids.push(id);
        }

        let mut visited = 0;
        registry.for_each(|_, _| {
            // Removing every session from inside the callback must not deadlock.
            for id in &ids {
                registry.unregister(id);
            }
            visited += 1;
        });

        assert_eq!(visited, 4);
        assert!(registry.is_empty());
    }

    #[test]
    fn for_each_skips_closing_sessions() {
        let registry = SessionRegistry::new();
        let (live, _rx1) = handle(1);
        let (closing, _rx2) = handle(1);
        closing.closing().cancel();
        registry.register(SessionId::new(), live);
        registry.register(SessionId::new(), closing);

        let mut visited = 0;
        registry.for_each(|_, _| visited += 1);

        assert_eq!(visited, 1);
    }

    #[test]
    fn try_deliver_reports_full_and_closed_queues() {
        let (h, mut rx) = handle(1);
        let event = Event::from("{}");

        assert_eq!(h.try_deliver(&event), Delivery::Enqueued);
        assert_eq!(h.try_deliver(&event), Delivery::Dropped);

        rx.close();
        assert_eq!(h.try_deliver(&event), Delivery::Closed);
    }

    #[test]
    fn mark_degraded_fires_closing_once() {
        let (h, _rx) = handle(1);

        assert!(h.mark_degraded());
        assert!(!h.mark_degraded());
        assert!(h.is_degraded());
        assert!(h.is_closing());
    }
}
