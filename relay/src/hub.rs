use crate::connection::{Delivery, SessionHandle, SessionId, SessionRegistry};
use async_trait::async_trait;
use events::{Event, EventHandler};
use log::*;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything a session needs from the Hub: the consuming end of its queue,
/// its closing signal, and a guard that unregisters it when dropped.
pub struct Subscription {
    pub id: SessionId,
    pub receiver: mpsc::Receiver<Event>,
    pub closing: CancellationToken,
    pub handle: Arc<SessionHandle>,
    pub guard: SubscriptionGuard,
}

/// Removes a session from the registry when dropped.
pub struct SubscriptionGuard {
    session_id: SessionId,
    registry: Arc<SessionRegistry>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if self.registry.unregister(&self.session_id).is_some() {
            info!(
                "Unregistered relay session {} ({} active)",
                self.session_id,
                self.registry.len()
            );
        }
    }
}

/// Outcome counts for one `publish` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub enqueued: usize,
    pub dropped: usize,
    pub closed: usize,
}

/// Fan-out point between the single upstream subscription and every
/// connected session.
pub struct Hub {
    registry: Arc<SessionRegistry>,
    queue_capacity: usize,
}

impl Hub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new subscriber with its own bounded queue.
    ///
    /// The subscriber's closing token is a child of `shutdown`, so cancelling
    /// `shutdown` closes every session.
    pub fn subscribe(&self, shutdown: &CancellationToken) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let closing = shutdown.child_token();
        let handle = Arc::new(SessionHandle::new(sender, closing.clone()));
        let mut session_id = SessionId::new();

        // Every subscription owns exactly one registry entry.
        while !self.registry.register(session_id.clone(), Arc::clone(&handle)) {
            session_id = SessionId::new();
        }
        info!(
            "Registered relay session {} ({} active)",
            session_id,
            self.registry.len()
        );

        Subscription {
            id: session_id.clone(),
            receiver,
            closing,
            handle,
            guard: SubscriptionGuard {
                session_id,
                registry: Arc::clone(&self.registry),
            },
        }
    }

    /// Remove a subscriber and signal it to close. Idempotent.
    pub fn unsubscribe(&self, session_id: &SessionId) -> bool {
        match self.registry.unregister(session_id) {
            Some(handle) => {
                handle.closing().cancel();
                info!(
                    "Unsubscribed relay session {} ({} active)",
                    session_id,
                    self.registry.len()
                );
                true
            }
            None => false,
        }
    }

    /// Offer `event` to every live subscriber without waiting on any of them.
    ///
    /// A full queue drops the event for that subscriber only and forces it
    /// closed. A subscriber whose receiver is gone is removed.
    pub fn publish(&self, event: &Event) -> PublishReport {
        let mut report = PublishReport::default();

        self.registry
            .for_each(|session_id, handle| match handle.try_deliver(event) {
                Delivery::Enqueued => report.enqueued += 1,
                Delivery::Dropped => {
                    report.dropped += 1;
                    if handle.mark_degraded() {
                        warn!(
                            "Relay session {session_id} is not keeping up, dropping event and closing it"
                        );
                    }
                }
                Delivery::Closed => {
                    report.closed += 1;
                    self.registry.unregister(session_id);
                    debug!("Pruned closed relay session {session_id}");
                }
            });

        report
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(crate::RelaySettings::default().queue_capacity)
    }
}

#[async_trait]
impl EventHandler for Hub {
    async fn handle(&self, event: &Event) {
        let report = self.publish(event);
        trace!(
            "Relayed event to {} session(s), {} dropped, {} closed",
            report.enqueued,
            report.dropped,
            report.closed
        );
    }
}
