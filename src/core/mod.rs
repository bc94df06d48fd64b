//! In-memory room state, undo/redo stacks and the room store.

/// Per-room log and stack manager.
pub mod room;
/// Undo/redo stack pair shared by the server and log-derived mirrors.
pub mod stacks;
/// Room-id keyed store with lazy creation and idle eviction.
pub mod store;
