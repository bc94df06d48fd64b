use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use log::warn;

use crate::{
    engine::replay::VisibleStroke,
    op::{Operation, Snapshot},
    stroke::Stroke,
    types::{MemberId, OpId, RoomId, User},
};

use super::handle::{JoinAck, Registry, RoomHandle, RuntimeConfig, RuntimeError, spawn_registered};

/// Routes room ids to their actors, spawning them on first reference.
///
/// Cheap to clone; every clone shares the same routing table.
#[derive(Clone)]
pub struct RoomHub {
    rooms: Arc<Registry>,
    config: RuntimeConfig,
    next_generation: Arc<AtomicU64>,
}

impl RoomHub {
    /// Creates an empty hub. Must be used inside a tokio runtime.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            rooms: Arc::new(Registry::new()),
            config,
            next_generation: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Handle for `room`, creating an empty room if none is live.
    pub fn get_or_create(&self, room: &RoomId) -> RoomHandle {
        if let Some(handle) = self.rooms.get(room) {
            if !handle.is_closed() {
                return handle.value().clone();
            }
        }

        let mut entry = self
            .rooms
            .entry(room.clone())
            .or_insert_with(|| self.spawn(room));
        if entry.is_closed() {
            *entry = self.spawn(room);
        }
        entry.value().clone()
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub async fn record_stroke(&self, room: &RoomId, user: User, stroke: Stroke) -> Result<Operation, RuntimeError> {
        self.call(room, |h| {
            let (user, stroke) = (user.clone(), stroke.clone());
            async move { h.record_stroke(user, stroke).await }
        })
        .await
    }

    pub async fn undo(&self, room: &RoomId, user: User, target: Option<OpId>) -> Result<Option<Operation>, RuntimeError> {
        self.call(room, |h| {
            let user = user.clone();
            async move { h.undo(user, target).await }
        })
        .await
    }

    pub async fn redo(&self, room: &RoomId, user: User, target: Option<OpId>) -> Result<Option<Operation>, RuntimeError> {
        self.call(room, |h| {
            let user = user.clone();
            async move { h.redo(user, target).await }
        })
        .await
    }

    pub async fn log(&self, room: &RoomId) -> Result<Vec<Operation>, RuntimeError> {
        self.call(room, |h| async move { h.log().await }).await
    }

    pub async fn snapshot(&self, room: &RoomId) -> Result<Snapshot, RuntimeError> {
        self.call(room, |h| async move { h.snapshot().await }).await
    }

    pub async fn replay(&self, room: &RoomId) -> Result<Vec<VisibleStroke>, RuntimeError> {
        self.call(room, |h| async move { h.replay().await }).await
    }

    pub async fn last_undoable(&self, room: &RoomId) -> Result<Option<Operation>, RuntimeError> {
        self.call(room, |h| async move { h.last_undoable().await }).await
    }

    pub async fn join(&self, room: &RoomId, member: MemberId, user: User) -> Result<(RoomHandle, JoinAck), RuntimeError> {
        self.call(room, |h| {
            let user = user.clone();
            async move {
                let ack = h.join(member, user).await?;
                Ok::<_, RuntimeError>((h, ack))
            }
        })
        .await
    }

    /// Stops every room actor and empties the routing table.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let handles: Vec<RoomHandle> = self.rooms.iter().map(|e| e.value().clone()).collect();
        self.rooms.clear();
        for handle in handles {
            match handle.shutdown().await {
                Ok(()) | Err(RuntimeError::ChannelClosed) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn spawn(&self, room: &RoomId) -> RoomHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        spawn_registered(room.clone(), generation, &self.config, Arc::downgrade(&self.rooms))
    }

    /// Runs `f` against the room, retrying once if the actor retired under it.
    async fn call<T, F, Fut>(&self, room: &RoomId, f: F) -> Result<T, RuntimeError>
    where
        F: Fn(RoomHandle) -> Fut,
        Fut: Future<Output = Result<T, RuntimeError>>,
    {
        match f(self.get_or_create(room)).await {
            Err(RuntimeError::ChannelClosed | RuntimeError::RoomEvicted) => {
                warn!("room {room} retired mid-request, retrying on a fresh actor");
                f(self.get_or_create(room)).await
            }
            other => other,
        }
    }
}
