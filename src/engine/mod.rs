//! Replay of a room log into its visible stroke timeline.
//!
//! This is the only definition of replay. Servers and client mirrors both
//! call [`replay::replay`] (or fold a [`replay::Timeline`]), so they cannot
//! drift apart.

/// Timeline reduction and the visible-stroke record.
pub mod replay;
