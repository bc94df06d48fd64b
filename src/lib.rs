//! Authoritative per-room drawing log with room-global undo/redo and
//! deterministic replay.
//!
//! # Examples
//!
//! Synchronous usage with [`core::store::RoomStore`]:
//! ```
//! use roomlog::{
//!     core::store::RoomStore,
//!     stroke::{Point, Stroke},
//!     types::{RoomId, User},
//! };
//!
//! let mut store = RoomStore::new();
//! let room = RoomId::parse("lobby").expect("room id");
//! let ada = User::new("u1", "Ada", "#e11d48");
//!
//! let a = store.record_stroke(&room, ada.clone(), Stroke::new(Default::default(), vec![Point::new(0.0, 0.0)]));
//! let b = store.record_stroke(&room, ada.clone(), Stroke::default());
//! store.undo(&room, ada.clone(), Some(a.op_id)).expect("undo a");
//! store.redo(&room, ada, None).expect("redo a");
//!
//! let order: Vec<_> = store.replay(&room).into_iter().map(|s| s.op_id).collect();
//! assert_eq!(order, vec![b.op_id, a.op_id]);
//! ```
//!
//! Runtime usage with one actor per room:
//! ```
//! use roomlog::{
//!     runtime::{handle::RuntimeConfig, hub::RoomHub},
//!     stroke::Stroke,
//!     types::{RoomId, User},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let hub = RoomHub::new(RuntimeConfig::default());
//! let room = RoomId::parse("lobby").expect("room id");
//! let ada = User::new("u1", "Ada", "#e11d48");
//!
//! hub.record_stroke(&room, ada.clone(), Stroke::default()).await.expect("stroke");
//! let undo = hub.undo(&room, ada, None).await.expect("undo");
//! assert!(undo.is_some());
//! assert!(hub.replay(&room).await.expect("replay").is_empty());
//! hub.shutdown().await.expect("shutdown");
//! # }
//! ```
#![warn(missing_docs)]

/// In-memory room state, stacks and store.
pub mod core;
/// Replay engine.
pub mod engine;
/// Operation model, wire shape and snapshots.
pub mod op;
/// Single-writer room runtime and events.
pub mod runtime;
/// Connection-facing session coordinator and protocol.
pub mod session;
/// Stroke payloads and incremental assembly.
pub mod stroke;
/// Shared identifiers and user identity.
pub mod types;
