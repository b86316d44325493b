//! WebSocket relay for database change notifications.
//!
//! This crate bridges a PostgreSQL `LISTEN` channel to any number of
//! connected WebSocket clients.
//!
//! # Architecture
//!
//! - **Single upstream subscription**: one dedicated connection issues
//!   `LISTEN` on the configured channel and is re-established with bounded
//!   exponential backoff whenever it drops (`listener`, `backoff`).
//! - **Bounded per-session queues**: the `Hub` enqueues every event into each
//!   session's own bounded queue with a non-blocking `try_send`. A full queue
//!   drops the event for that session only, marks it degraded and forces it
//!   closed. A stalled client never delays healthy ones or the upstream read
//!   loop.
//! - **Snapshot iteration**: the `SessionRegistry` is a DashMap keyed by a
//!   server-generated `SessionId`. Fan-out iterates a snapshot, so sessions
//!   may register or unregister concurrently without blocking delivery.
//! - **Two flows per session**: an outbound flow writes queued events as text
//!   frames; a liveness flow watches for peer close. Whichever notices the end
//!   first fires the session's closing token and the other stops.
//! - **Ephemeral events**: nothing is replayed. A client that is offline, or
//!   connected while the upstream subscription is reconnecting, misses those
//!   events and sees fresh data on its next REST fetch.
//!
//! # Message Flow
//!
//! 1. A sale is inserted and `pg_notify` is called in the same transaction
//! 2. `EventSource` yields the payload as an `events::Event`
//! 3. `forward` hands it to the `EventPublisher`, which calls `Hub::handle`
//! 4. The Hub enqueues it for every live session
//! 5. Each `ClientSession` writes it verbatim as one text frame
//!
//! # Modules
//!
//! - `backoff`: reconnect delay policy
//! - `connection`: SessionRegistry and type-safe SessionId
//! - `error`: relay error kinds
//! - `hub`: fan-out with slow-consumer isolation
//! - `listener`: upstream notification subscription with reconnect
//! - `session`: per-connection outbound and liveness flows

use std::time::Duration;

pub mod backoff;
pub mod connection;
pub mod error;
pub mod hub;
pub mod listener;
pub mod session;

pub use backoff::Backoff;
pub use hub::Hub;
pub use listener::{forward, EventSource, PgConnector};
pub use session::ClientSession;

/// Tunables for the relay, assembled from the service configuration.
#[derive(Clone, Debug)]
pub struct RelaySettings {
    /// Notification channel name passed to `LISTEN`
    pub channel: String,
    /// Capacity of each session's outbound queue
    pub queue_capacity: usize,
    /// Interval between keep-alive pings on idle sessions
    pub ping_interval: Duration,
    /// Upper bound on establishing the upstream subscription
    pub connect_timeout: Duration,
    /// Delay policy between reconnect attempts
    pub backoff: Backoff,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            channel: "sales_channel".to_string(),
            queue_capacity: 64,
            ping_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            backoff: Backoff::default(),
        }
    }
}
