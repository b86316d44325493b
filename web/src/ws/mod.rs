//! WebSocket endpoint for the live sales relay.
//!
//! The fan-out Hub, client sessions and upstream subscription live in the
//! `relay` crate; this module only turns an HTTP request into a session.

pub(crate) mod handler;
