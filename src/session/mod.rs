//! Connection-facing coordinator: decodes client messages, drives the room
//! actors and turns room events into outbound messages.

/// Per-connection session state machine.
pub mod coordinator;
/// Client and server message types.
pub mod protocol;
