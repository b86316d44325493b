use crate::connection::SessionId;
use crate::error::{Error, RelayErrorKind};
use crate::hub::Subscription;
use axum::extract::ws::Message;
use events::Event;
use futures::{Sink, SinkExt, Stream, StreamExt};
use log::*;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Lifecycle of one relay request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Received,
    Upgrading,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Received, Upgrading)
                | (Received, Closed)
                | (Upgrading, Active)
                | (Upgrading, Closed)
                | (Active, Closing)
                | (Closing, Closed)
        )
    }
}

/// Why a session ended. The first flow to record a reason wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client sent a close frame or the connection ended
    PeerClosed,
    /// The client sent something the protocol layer rejected
    ProtocolError,
    /// A frame could not be written
    WriteFailed,
    /// The session's queue overflowed and the Hub forced it closed
    Overflow,
    /// Server shutdown or an explicit unsubscribe
    Cancelled,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CloseReason::PeerClosed => "peer closed",
            CloseReason::ProtocolError => "protocol error",
            CloseReason::WriteFailed => "write failed",
            CloseReason::Overflow => "queue overflow",
            CloseReason::Cancelled => "cancelled",
        };
        f.write_str(reason)
    }
}

#[derive(Debug)]
pub struct SessionOutcome {
    pub id: SessionId,
    pub reason: CloseReason,
    pub events_sent: u64,
}

type ReasonCell = Arc<OnceLock<CloseReason>>;

/// One upgraded client connection, subscribed to the Hub.
///
/// Generic over the two connection halves so the same flows run over an
/// axum `WebSocket` in production and over in-memory channels in tests.
pub struct ClientSession<S, R> {
    subscription: Subscription,
    sink: S,
    stream: R,
    ping_interval: Duration,
}

impl<S, R, E> ClientSession<S, R>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: fmt::Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    pub fn new(subscription: Subscription, sink: S, stream: R, ping_interval: Duration) -> Self {
        Self {
            subscription,
            sink,
            stream,
            ping_interval,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.subscription.id
    }

    /// Run both flows until either one ends the session, then tear down.
    ///
    /// Both tasks are joined before this returns. Dropping the returned
    /// future fires the closing signal so neither task outlives it.
    pub async fn run(self) -> SessionOutcome {
        let ClientSession {
            subscription,
            sink,
            stream,
            ping_interval,
        } = self;
        let Subscription {
            id,
            receiver,
            closing,
            handle,
            guard,
        } = subscription;
        let _cancel_on_drop = closing.clone().drop_guard();

        let mut state = SessionState::Upgrading;
        transition(&id, &mut state, SessionState::Active);

        let reason: ReasonCell = Arc::new(OnceLock::new());
        let outbound = tokio::spawn(outbound(
            id.clone(),
            sink,
            receiver,
            closing.clone(),
            ping_interval,
            Arc::clone(&reason),
        ));
        let liveness = tokio::spawn(liveness(
            id.clone(),
            stream,
            closing.clone(),
            Arc::clone(&reason),
        ));

        // A flow that panics must still release the other one.
        let (outbound, liveness) = tokio::join!(
            async {
                let finished = outbound.await;
                closing.cancel();
                finished
            },
            async {
                let finished = liveness.await;
                closing.cancel();
                finished
            },
        );
        transition(&id, &mut state, SessionState::Closing);

        // Leave the registry before the connection is closed.
        drop(guard);

        if let Err(e) = liveness {
            warn!("Relay session {id}: liveness task failed: {e}");
        }
        let events_sent = match outbound {
            Ok((sink, events_sent, true)) => {
                // Closing would flush the half-written frame onto the wire.
                debug!("Relay session {id}: write interrupted, dropping connection");
                drop(sink);
                events_sent
            }
            Ok((mut sink, events_sent, false)) => {
                if let Err(e) = sink.close().await {
                    debug!("Relay session {id}: error closing connection: {e}");
                }
                events_sent
            }
            Err(e) => {
                warn!("Relay session {id}: outbound task failed: {e}");
                0
            }
        };

        let reason = match reason.get() {
            Some(reason) => *reason,
            None if handle.is_degraded() => CloseReason::Overflow,
            None => CloseReason::Cancelled,
        };
        transition(&id, &mut state, SessionState::Closed);
        info!("Relay session {id} closed ({reason}) after {events_sent} event(s)");

        SessionOutcome {
            id,
            reason,
            events_sent,
        }
    }
}

fn transition(id: &SessionId, state: &mut SessionState, next: SessionState) {
    if state.can_transition_to(next) {
        debug!("Relay session {id}: {state:?} -> {next:?}");
    } else {
        warn!("Relay session {id}: unexpected transition {state:?} -> {next:?}");
    }
    *state = next;
}

/// Writes queued events as text frames, plus a ping whenever the interval
/// elapses. Returns the sink so the caller can close it, and whether a
/// write was cut short by the closing signal.
async fn outbound<S>(
    id: SessionId,
    mut sink: S,
    mut receiver: mpsc::Receiver<Event>,
    closing: CancellationToken,
    ping_interval: Duration,
    reason: ReasonCell,
) -> (S, u64, bool)
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    // A zero interval disables keep-alive pings.
    let mut ping = (!ping_interval.is_zero()).then(|| {
        let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping
    });
    let mut events_sent = 0;
    let mut interrupted = false;

    loop {
        let (frame, is_event) = tokio::select! {
            biased;
            _ = closing.cancelled() => break,
            event = receiver.recv() => match event {
                Some(event) => (Message::Text(event.as_str().to_owned()), true),
                None => break,
            },
            _ = next_ping(&mut ping) => (Message::Ping(Vec::new()), false),
        };

        if closing.is_cancelled() {
            break;
        }
        let sent = tokio::select! {
            biased;
            _ = closing.cancelled() => {
                interrupted = true;
                break;
            }
            sent = sink.send(frame) => sent,
        };

        match sent {
            Ok(()) if is_event => events_sent += 1,
            Ok(()) => trace!("Relay session {id}: ping"),
            Err(e) => {
                let err = Error::with_reason(RelayErrorKind::Write, e.to_string());
                warn!("Relay session {id}: {err}");
                let _ = reason.set(CloseReason::WriteFailed);
                break;
            }
        }
    }

    receiver.close();
    closing.cancel();
    (sink, events_sent, interrupted)
}

async fn next_ping(ping: &mut Option<Interval>) {
    match ping {
        Some(ping) => {
            ping.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Watches the inbound half for the end of the connection. Application
/// frames from the client are ignored.
async fn liveness<R, E>(id: SessionId, mut stream: R, closing: CancellationToken, reason: ReasonCell)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = closing.cancelled() => break,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Close(_))) | None => {
                let _ = reason.set(CloseReason::PeerClosed);
                break;
            }
            Some(Ok(_)) => trace!("Relay session {id}: ignoring inbound frame"),
            Some(Err(e)) => {
                debug!("Relay session {id}: inbound error: {e}");
                let _ = reason.set(CloseReason::ProtocolError);
                break;
            }
        }
    }

    closing.cancel();
}
