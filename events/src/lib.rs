//! Event system infrastructure for the sales relay.
//!
//! This crate provides the types that flow from the database notification
//! channel to connected relay clients, and the publisher that hands each
//! event to the registered handlers.
//!
//! # Architecture
//!
//! - **Event**: an opaque, already-serialized payload. The relay forwards it
//!   verbatim and never re-serializes it.
//! - **ChangeNotification**: the typed shape producers serialize into an
//!   `Event` (`{"operation": "INSERT", "record": {...}}`).
//! - **EventHandler**: trait for implementing event handlers
//! - **EventPublisher**: publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates (entity, relay, etc.),
//! avoiding circular dependencies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A single change notification as received from the event source.
///
/// Immutable once produced. Cloning shares the underlying bytes, so every
/// session that receives the same event holds the same allocation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Event(Arc<str>);

impl Event {
    pub fn new(payload: impl Into<Arc<str>>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Event {
    fn from(payload: String) -> Self {
        Self::new(payload)
    }
}

impl From<&str> for Event {
    fn from(payload: &str) -> Self {
        Self::new(payload)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Event").field(&self.as_str()).finish()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of row change a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

/// Typed notification body. Producers serialize this into an [`Event`]
/// before handing it to the database notification channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification<T> {
    pub operation: Operation,
    /// The affected row, serialized with its wire field names.
    pub record: T,
}

impl<T: Serialize> ChangeNotification<T> {
    pub fn insert(record: T) -> Self {
        Self {
            operation: Operation::Insert,
            record,
        }
    }

    /// Serialize into the payload format carried on the notification channel.
    pub fn to_event(&self) -> Result<Event, serde_json::Error> {
        serde_json::to_string(self).map(Event::from)
    }
}

/// Trait for handling events.
/// Implementations must not block: `handle` is awaited on the event source's
/// read loop.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event);
}

/// Publishes events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    pub async fn publish(&self, event: Event) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
