//! Error types for the relay.
use std::error::Error as StdError;
use std::fmt;

/// Errors raised inside the relay.
///
/// None of these terminate the process. `Connect` is only surfaced to the
/// caller while the initial subscription is being established; after that,
/// connect and transport failures are absorbed by the reconnect loop, and
/// write failures end only the session that hit them.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: RelayErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayErrorKind {
    // The notification subscription could not be established or re-established
    Connect,
    // An established subscription failed while waiting for notifications
    Transport,
    // An inbound request could not be upgraded to a WebSocket
    ProtocolUpgrade,
    // A frame could not be delivered to a client
    Write,
}

/// Message-only error source for failures that carry no underlying error value.
#[derive(Debug)]
struct Reason(String);

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Reason {}

impl Error {
    pub fn new<E>(error_kind: RelayErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self {
            source: Some(source.into()),
            error_kind,
        }
    }

    pub fn with_reason(error_kind: RelayErrorKind, reason: impl Into<String>) -> Self {
        Self::new(error_kind, Reason(reason.into()))
    }

    pub fn connect<E>(source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self::new(RelayErrorKind::Connect, source)
    }

    pub fn transport<E>(source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self::new(RelayErrorKind::Transport, source)
    }

    pub fn is_connect(&self) -> bool {
        self.error_kind == RelayErrorKind::Connect
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Relay Error ({:?}): {source}", self.error_kind),
            None => write!(f, "Relay Error ({:?})", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_reason() {
        let err = Error::with_reason(RelayErrorKind::Connect, "timed out after 10s");

        assert!(err.is_connect());
        assert_eq!(err.to_string(), "Relay Error (Connect): timed out after 10s");
    }

    #[test]
    fn source_is_exposed_through_std_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = Error::transport(io);

        assert_eq!(err.error_kind, RelayErrorKind::Transport);
        assert_eq!(StdError::source(&err).unwrap().to_string(), "reset by peer");
    }
}
