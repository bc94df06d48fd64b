use hashbrown::HashMap;
use log::{debug, info};

use crate::{
    engine::replay::VisibleStroke,
    op::Operation,
    stroke::Stroke,
    types::{OpId, RoomId, TimestampMs, User},
};

use super::room::RoomState;

/// Room-id keyed collection of [`RoomState`], created on first reference.
///
/// Single-threaded: callers serialize access. [`crate::runtime`] wraps each
/// room in its own actor for concurrent use.
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: HashMap<RoomId, RoomState>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, room: &RoomId) -> &mut RoomState {
        self.rooms.entry(room.clone()).or_insert_with(|| {
            info!("room {room} created");
            RoomState::new()
        })
    }

    /// Existing room, without creating it.
    pub fn get(&self, room: &RoomId) -> Option<&RoomState> {
        self.rooms.get(room)
    }

    pub fn append(&mut self, room: &RoomId, op: Operation) {
        self.get_or_create(room).append(op);
    }

    /// Read-only view of a room's log for snapshotting.
    pub fn log_of(&mut self, room: &RoomId) -> &[Operation] {
        self.get_or_create(room).log()
    }

    pub fn record_stroke(&mut self, room: &RoomId, user: User, stroke: Stroke) -> Operation {
        let op = self.get_or_create(room).record_stroke(user, stroke);
        debug!("room {room}: stroke {}", op.op_id);
        op
    }

    pub fn undo(&mut self, room: &RoomId, user: User, target: Option<OpId>) -> Option<Operation> {
        let op = self.get_or_create(room).undo(user, target);
        match &op {
            Some(op) => debug!("room {room}: undo {:?}", op.target()),
            None => debug!("room {room}: nothing to undo"),
        }
        op
    }

    pub fn redo(&mut self, room: &RoomId, user: User, target: Option<OpId>) -> Option<Operation> {
        let op = self.get_or_create(room).redo(user, target);
        match &op {
            Some(op) => debug!("room {room}: redo {:?}", op.target()),
            None => debug!("room {room}: nothing to redo"),
        }
        op
    }

    pub fn replay(&mut self, room: &RoomId) -> Vec<VisibleStroke> {
        self.get_or_create(room).replay()
    }

    pub fn last_undoable(&mut self, room: &RoomId) -> Option<Operation> {
        self.get_or_create(room).last_undoable().cloned()
    }

    pub fn room_ids(&self) -> impl Iterator<Item = &RoomId> {
        self.rooms.keys()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Drops rooms untouched for at least `ttl_ms` as of `now_ms`.
    ///
    /// Returns how many rooms were evicted. Their history is gone.
    pub fn evict_idle(&mut self, now_ms: TimestampMs, ttl_ms: u64) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|room, state| {
            let keep = now_ms.saturating_sub(state.last_activity_ms()) < ttl_ms;
            if !keep {
                info!("room {room} evicted after {ttl_ms}ms idle");
            }
            keep
        });
        before - self.rooms.len()
    }
}
