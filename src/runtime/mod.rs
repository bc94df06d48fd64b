//! Single-writer room actors, the routing hub and room events.

/// Event stream types emitted by room actors.
pub mod events;
/// Room actor, its handle and runtime configuration.
pub mod handle;
/// Lazily populated room-id to actor routing table.
pub mod hub;
