use std::sync::Weak;

use dashmap::DashMap;
use log::{debug, info};
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{Duration, Instant, sleep_until},
};

use crate::{
    core::room::RoomState,
    engine::replay::VisibleStroke,
    op::{Operation, Snapshot},
    stroke::Stroke,
    types::{MemberId, OpId, RoomId, User},
};

use super::events::RoomEvent;

/// Failure to reach a room actor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// The actor has stopped and its queue is gone.
    #[error("room actor channel closed")]
    ChannelClosed,
    /// The actor retired for inactivity while the command was queued.
    #[error("room was evicted")]
    RoomEvicted,
}

/// Tuning for room actors and sessions.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Bound of each room's command queue.
    pub command_queue_bound: usize,
    /// Capacity of each room's event broadcast channel.
    pub event_capacity: usize,
    /// Retire rooms with no members after this long without a command.
    /// `None` keeps rooms for the life of the process.
    pub idle_room_ttl_ms: Option<u64>,
    /// Points buffered per in-progress stroke before new ones are dropped.
    pub max_stroke_points: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            event_capacity: 1024,
            idle_room_ttl_ms: None,
            max_stroke_points: 10_000,
        }
    }
}

/// What a joining member receives, taken atomically by the room actor.
///
/// Every event on `events` happened after `snapshot`.
#[derive(Debug)]
pub struct JoinAck {
    /// Roster including the new member.
    pub roster: Vec<User>,
    /// Full room log at join time.
    pub snapshot: Snapshot,
    /// Subscription to later room events.
    pub events: broadcast::Receiver<RoomEvent>,
}

/// A fresh snapshot and the subscription that continues right after it.
pub type Resync = (Snapshot, broadcast::Receiver<RoomEvent>);

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

enum Command {
    RecordStroke {
        user: User,
        stroke: Stroke,
        resp: Reply<Operation>,
    },
    Undo {
        user: User,
        target: Option<OpId>,
        resp: Reply<Option<Operation>>,
    },
    Redo {
        user: User,
        target: Option<OpId>,
        resp: Reply<Option<Operation>>,
    },
    Log {
        resp: Reply<Vec<Operation>>,
    },
    Replay {
        resp: Reply<Vec<VisibleStroke>>,
    },
    LastUndoable {
        resp: Reply<Option<Operation>>,
    },
    Recent {
        n: usize,
        resp: Reply<Vec<Operation>>,
    },
    Join {
        member: MemberId,
        user: User,
        resp: Reply<JoinAck>,
    },
    Leave {
        member: MemberId,
        resp: Reply<bool>,
    },
    Resync {
        resp: Reply<Resync>,
    },
    Members {
        resp: Reply<Vec<User>>,
    },
    Shutdown {
        resp: Reply<()>,
    },
}

impl Command {
    fn reject(self, err: RuntimeError) {
        match self {
            Command::RecordStroke { resp, .. } => drop(resp.send(Err(err))),
            Command::Undo { resp, .. } | Command::Redo { resp, .. } => drop(resp.send(Err(err))),
            Command::Log { resp } | Command::Recent { resp, .. } => drop(resp.send(Err(err))),
            Command::Replay { resp } => drop(resp.send(Err(err))),
            Command::LastUndoable { resp } => drop(resp.send(Err(err))),
            Command::Join { resp, .. } => drop(resp.send(Err(err))),
            Command::Leave { resp, .. } => drop(resp.send(Err(err))),
            Command::Resync { resp } => drop(resp.send(Err(err))),
            Command::Members { resp } => drop(resp.send(Err(err))),
            Command::Shutdown { resp } => drop(resp.send(Ok(()))),
        }
    }
}

pub(crate) type Registry = DashMap<RoomId, RoomHandle>;

/// Cloneable handle to one room's single-writer actor.
///
/// All mutations of a room are serialized by its actor; separate rooms run
/// independently.
#[derive(Clone)]
pub struct RoomHandle {
    room: RoomId,
    generation: u64,
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<RoomEvent>,
}

/// Spawns a standalone room actor with an empty log.
pub fn spawn_room(room: RoomId, config: &RuntimeConfig) -> RoomHandle {
    spawn_registered(room, 0, config, Weak::new())
}

pub(crate) fn spawn_registered(
    room: RoomId,
    generation: u64,
    config: &RuntimeConfig,
    registry: Weak<Registry>,
) -> RoomHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<RoomEvent>(config.event_capacity.max(1));

    let actor = RoomActor {
        room: room.clone(),
        generation,
        state: RoomState::new(),
        members: Vec::new(),
        events_tx: events_tx.clone(),
        registry,
    };
    tokio::spawn(actor.run(cmd_rx, config.idle_room_ttl_ms.map(Duration::from_millis)));
    info!("room {room} actor started (generation {generation})");

    RoomHandle {
        room,
        generation,
        cmd_tx,
        events_tx,
    }
}

impl RoomHandle {
    /// Room served by this actor.
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// True once the actor has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events_tx.subscribe()
    }

    /// Broadcasts a preview event without touching the log.
    pub fn relay(&self, event: RoomEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("room {}: relay with no subscribers", self.room);
        }
    }

    pub async fn record_stroke(&self, user: User, stroke: Stroke) -> Result<Operation, RuntimeError> {
        self.request(|resp| Command::RecordStroke { user, stroke, resp }).await
    }

    pub async fn undo(&self, user: User, target: Option<OpId>) -> Result<Option<Operation>, RuntimeError> {
        self.request(|resp| Command::Undo { user, target, resp }).await
    }

    pub async fn redo(&self, user: User, target: Option<OpId>) -> Result<Option<Operation>, RuntimeError> {
        self.request(|resp| Command::Redo { user, target, resp }).await
    }

    pub async fn log(&self) -> Result<Vec<Operation>, RuntimeError> {
        self.request(|resp| Command::Log { resp }).await
    }

    pub async fn snapshot(&self) -> Result<Snapshot, RuntimeError> {
        Ok(Snapshot {
            op_log: self.log().await?,
        })
    }

    pub async fn replay(&self) -> Result<Vec<VisibleStroke>, RuntimeError> {
        self.request(|resp| Command::Replay { resp }).await
    }

    pub async fn last_undoable(&self) -> Result<Option<Operation>, RuntimeError> {
        self.request(|resp| Command::LastUndoable { resp }).await
    }

    pub async fn recent(&self, n: usize) -> Result<Vec<Operation>, RuntimeError> {
        self.request(|resp| Command::Recent { n, resp }).await
    }

    /// Adds a connection to the roster and subscribes it from this point on.
    pub async fn join(&self, member: MemberId, user: User) -> Result<JoinAck, RuntimeError> {
        self.request(|resp| Command::Join { member, user, resp }).await
    }

    /// Removes a connection. Returns whether it was a member.
    pub async fn leave(&self, member: MemberId) -> Result<bool, RuntimeError> {
        self.request(|resp| Command::Leave { member, resp }).await
    }

    /// Re-reads the log and resubscribes in one step, for a subscriber that
    /// fell behind. Nothing in the snapshot shows up again on the receiver.
    pub async fn resync(&self) -> Result<Resync, RuntimeError> {
        self.request(|resp| Command::Resync { resp }).await
    }

    pub async fn members(&self) -> Result<Vec<User>, RuntimeError> {
        self.request(|resp| Command::Members { resp }).await
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }
}

struct RoomActor {
    room: RoomId,
    generation: u64,
    state: RoomState,
    members: Vec<(MemberId, User)>,
    events_tx: broadcast::Sender<RoomEvent>,
    registry: Weak<Registry>,
}

impl RoomActor {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>, idle_ttl: Option<Duration>) {
        let mut last_command = Instant::now();
        loop {
            let deadline = idle_ttl
                .filter(|_| self.members.is_empty())
                .map(|ttl| last_command + ttl);
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    // A command landing on an expired deadline goes to the next actor.
                    if deadline.is_some_and(|at| Instant::now() >= at) {
                        self.retire(Some(cmd), &mut cmd_rx).await;
                        break;
                    }
                    if self.handle_command(cmd) {
                        break;
                    }
                    last_command = Instant::now();
                }
                _ = sleep_until(deadline.unwrap_or(last_command)), if deadline.is_some() => {
                    self.retire(None, &mut cmd_rx).await;
                    break;
                }
            }
        }
        debug!("room {} actor stopped", self.room);
    }

    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::RecordStroke { user, stroke, resp } => {
                let op = self.state.record_stroke(user, stroke);
                debug!("room {}: stroke {} by {}", self.room, op.op_id, op.user.id);
                self.publish(RoomEvent::Appended(op.clone()));
                let _ = resp.send(Ok(op));
            }
            Command::Undo { user, target, resp } => {
                let op = self.state.undo(user, target);
                self.after_history_op("undo", op.as_ref());
                let _ = resp.send(Ok(op));
            }
            Command::Redo { user, target, resp } => {
                let op = self.state.redo(user, target);
                self.after_history_op("redo", op.as_ref());
                let _ = resp.send(Ok(op));
            }
            Command::Log { resp } => {
                let _ = resp.send(Ok(self.state.log().to_vec()));
            }
            Command::Replay { resp } => {
                let _ = resp.send(Ok(self.state.replay()));
            }
            Command::LastUndoable { resp } => {
                let _ = resp.send(Ok(self.state.last_undoable().cloned()));
            }
            Command::Recent { n, resp } => {
                let _ = resp.send(Ok(self.state.recent(n).to_vec()));
            }
            Command::Join { member, user, resp } => {
                match self.members.iter_mut().find(|(id, _)| *id == member) {
                    Some(slot) => slot.1 = user,
                    None => {
                        info!("room {}: {} joined", self.room, user.id);
                        self.members.push((member, user));
                    }
                }
                let roster = self.roster();
                self.publish(RoomEvent::Roster(roster.clone()));
                let ack = JoinAck {
                    roster,
                    snapshot: Snapshot {
                        op_log: self.state.log().to_vec(),
                    },
                    events: self.events_tx.subscribe(),
                };
                let _ = resp.send(Ok(ack));
            }
            Command::Leave { member, resp } => {
                let before = self.members.len();
                self.members.retain(|(id, _)| *id != member);
                let removed = self.members.len() != before;
                if removed {
                    info!("room {}: member {member} left", self.room);
                    self.publish(RoomEvent::Roster(self.roster()));
                }
                let _ = resp.send(Ok(removed));
            }
            Command::Resync { resp } => {
                let snapshot = Snapshot {
                    op_log: self.state.log().to_vec(),
                };
                let _ = resp.send(Ok((snapshot, self.events_tx.subscribe())));
            }
            Command::Members { resp } => {
                let _ = resp.send(Ok(self.roster()));
            }
            Command::Shutdown { resp } => {
                let _ = resp.send(Ok(()));
                return true;
            }
        }
        false
    }

    fn after_history_op(&self, kind: &str, op: Option<&Operation>) {
        match op {
            Some(op) => {
                debug!("room {}: {kind} of {:?} by {}", self.room, op.target(), op.user.id);
                self.publish(RoomEvent::Appended(op.clone()));
            }
            None => debug!("room {}: nothing to {kind}", self.room),
        }
    }

    /// Leaves the registry, then refuses whatever is still queued.
    async fn retire(&mut self, late: Option<Command>, cmd_rx: &mut mpsc::Receiver<Command>) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_if(&self.room, |_, handle| handle.generation() == self.generation);
        }
        cmd_rx.close();
        if let Some(cmd) = late {
            cmd.reject(RuntimeError::RoomEvicted);
        }
        while let Some(cmd) = cmd_rx.recv().await {
            cmd.reject(RuntimeError::RoomEvicted);
        }
        info!(
            "room {} evicted after idling with {} logged ops",
            self.room,
            self.state.log().len()
        );
    }

    fn roster(&self) -> Vec<User> {
        self.members.iter().map(|(_, user)| user.clone()).collect()
    }

    fn publish(&self, event: RoomEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("room {}: event with no subscribers", self.room);
        }
    }
}
