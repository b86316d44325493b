//! Typed parameters for endpoint inputs.
//!
//! Query strings are deserialized into these structs before any handler
//! logic runs, so each handler sees a validated shape.

pub(crate) mod sale;
