use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    runtime::{
        events::RoomEvent,
        handle::{RoomHandle, RuntimeError},
        hub::RoomHub,
    },
    stroke::StrokeBuilder,
    types::{MemberId, OpId, RoomId, RoomIdError, User},
};

use super::protocol::{self, ClientMessage, ServerMessage};

/// Rejected client request.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The frame was not a valid [`ClientMessage`].
    #[error("malformed message: {0}")]
    Protocol(#[from] serde_json::Error),
    /// The message named an unusable room.
    #[error(transparent)]
    InvalidRoom(#[from] RoomIdError),
    /// The action needs membership of a room this connection has not joined.
    #[error("not joined to room `{0}`")]
    NotJoined(String),
    /// `endStroke` arrived without a stroke or a prior `startStroke`.
    #[error("no stroke in progress")]
    NoStrokeInProgress,
    /// The room actor could not be reached.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

struct Joined {
    handle: RoomHandle,
    user: User,
    events: broadcast::Receiver<RoomEvent>,
}

/// One connection's view of the rooms: membership, stroke buffer, fan-out.
///
/// The transport feeds inbound frames to [`Session::handle_text`], writes
/// back its replies, and forwards [`Session::next_event`] to the client.
///
/// Call [`Session::disconnect`] when the connection closes. Dropping a joined
/// session instead spawns a best-effort leave on the current tokio runtime;
/// outside a runtime the member stays in the roster until the room retires.
pub struct Session {
    member: MemberId,
    hub: RoomHub,
    joined: Option<Joined>,
    pending: Option<StrokeBuilder>,
}

impl Session {
    pub fn new(hub: RoomHub) -> Self {
        Self {
            member: MemberId::new_v4(),
            hub,
            joined: None,
            pending: None,
        }
    }

    pub fn member(&self) -> MemberId {
        self.member
    }

    /// Room currently joined, if any.
    pub fn room(&self) -> Option<&RoomId> {
        self.joined.as_ref().map(|j| j.handle.room())
    }

    /// Handles one text frame. Failures become an `error` reply.
    pub async fn handle_text(&mut self, text: &str) -> Vec<ServerMessage> {
        let result = match protocol::decode(text) {
            Ok(msg) => self.handle(msg).await,
            Err(err) => Err(SessionError::from(err)),
        };
        result.unwrap_or_else(|err| {
            warn!("session {}: {err}", self.member);
            vec![ServerMessage::Error {
                message: err.to_string(),
            }]
        })
    }

    /// Handles one decoded message and returns the replies for this connection.
    ///
    /// Appended operations reach every member, this one included, through
    /// [`Session::next_event`] rather than the reply.
    pub async fn handle(&mut self, msg: ClientMessage) -> Result<Vec<ServerMessage>, SessionError> {
        match msg {
            ClientMessage::Join { room_id, user } => self.join(&room_id, user).await,
            ClientMessage::Leave { room_id } => {
                let room = RoomId::parse(&room_id)?;
                if self.room() == Some(&room) {
                    self.leave().await?;
                }
                Ok(Vec::new())
            }
            ClientMessage::StartStroke { room_id, stroke } => {
                let joined = self.joined_to(&room_id)?;
                joined.handle.relay(RoomEvent::StrokeStarted {
                    from: self.member,
                    user: joined.user.clone(),
                    stroke: stroke.clone(),
                });
                let max_points = self.hub.config().max_stroke_points;
                self.pending = Some(StrokeBuilder::start(stroke, max_points));
                Ok(Vec::new())
            }
            ClientMessage::StrokePoint { room_id, point } => {
                let joined = self.joined_to(&room_id)?;
                joined.handle.relay(RoomEvent::StrokePoint {
                    from: self.member,
                    user: joined.user.clone(),
                    point,
                });
                match self.pending.as_mut() {
                    Some(builder) => {
                        builder.push(point);
                    }
                    None => debug!("session {}: point without a stroke in progress", self.member),
                }
                Ok(Vec::new())
            }
            ClientMessage::EndStroke { room_id, stroke } => {
                let joined = self.joined_to(&room_id)?;
                let (handle, user) = (joined.handle.clone(), joined.user.clone());
                let buffered = self.pending.take();
                if let Some(builder) = &buffered {
                    if builder.dropped() > 0 {
                        warn!(
                            "session {}: stroke truncated, {} points dropped",
                            self.member,
                            builder.dropped()
                        );
                    }
                }
                let stroke = stroke
                    .or_else(|| buffered.map(StrokeBuilder::finish))
                    .ok_or(SessionError::NoStrokeInProgress)?;
                handle.record_stroke(user, stroke).await?;
                Ok(Vec::new())
            }
            ClientMessage::Undo { room_id, target_op_id } => {
                let joined = self.joined_to(&room_id)?;
                let (handle, user) = (joined.handle.clone(), joined.user.clone());
                let Some(target) = parse_target(target_op_id.as_deref()) else {
                    return Ok(vec![ServerMessage::NothingToUndo]);
                };
                match handle.undo(user, target).await? {
                    Some(_) => Ok(Vec::new()),
                    None => Ok(vec![ServerMessage::NothingToUndo]),
                }
            }
            ClientMessage::Redo { room_id, target_op_id } => {
                let joined = self.joined_to(&room_id)?;
                let (handle, user) = (joined.handle.clone(), joined.user.clone());
                let Some(target) = parse_target(target_op_id.as_deref()) else {
                    return Ok(vec![ServerMessage::NothingToRedo]);
                };
                match handle.redo(user, target).await? {
                    Some(_) => Ok(Vec::new()),
                    None => Ok(vec![ServerMessage::NothingToRedo]),
                }
            }
            ClientMessage::RequestSnapshot { room_id } => {
                let room = RoomId::parse(&room_id)?;
                let snapshot = match self.joined.as_ref().filter(|j| j.handle.room() == &room) {
                    Some(joined) => joined.handle.snapshot().await?,
                    None => self.hub.snapshot(&room).await?,
                };
                Ok(vec![ServerMessage::Snapshot(snapshot)])
            }
        }
    }

    /// Next broadcast for this connection. `None` when no room is joined.
    ///
    /// A subscriber that fell behind gets a fresh snapshot instead of the
    /// missed operations.
    pub async fn next_event(&mut self) -> Option<ServerMessage> {
        loop {
            let joined = self.joined.as_mut()?;
            let event = match joined.events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(missed)) => {
                    warn!("session {}: lagged {missed} events, resyncing", self.member);
                    return match joined.handle.resync().await {
                        Ok((snapshot, events)) => {
                            joined.events = events;
                            Some(ServerMessage::Snapshot(snapshot))
                        }
                        Err(err) => Some(ServerMessage::Error {
                            message: err.to_string(),
                        }),
                    };
                }
                Err(RecvError::Closed) => {
                    info!("session {}: room {} closed", self.member, joined.handle.room());
                    self.joined = None;
                    return None;
                }
            };

            let msg = match event {
                RoomEvent::Appended(op) => ServerMessage::Operation { op },
                RoomEvent::Roster(users) => ServerMessage::UserList { users },
                RoomEvent::StrokeStarted { from, user, stroke } if from != self.member => {
                    ServerMessage::StartStroke { user, stroke }
                }
                RoomEvent::StrokePoint { from, user, point } if from != self.member => {
                    ServerMessage::StrokePoint { user, point }
                }
                _ => continue,
            };
            return Some(msg);
        }
    }

    /// Leaves the current room. Call when the connection drops.
    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        self.leave().await
    }

    async fn join(&mut self, room_id: &str, user: User) -> Result<Vec<ServerMessage>, SessionError> {
        let room = RoomId::parse(room_id)?;
        self.pending = None;
        if self.room().is_some_and(|current| current != &room) {
            self.leave().await?;
        }

        let (handle, ack) = self.hub.join(&room, self.member, user.clone()).await?;
        info!("session {} joined room {room} as {}", self.member, user.id);
        self.joined = Some(Joined {
            handle,
            user,
            events: ack.events,
        });
        Ok(vec![
            ServerMessage::UserList { users: ack.roster },
            ServerMessage::Snapshot(ack.snapshot),
        ])
    }

    async fn leave(&mut self) -> Result<(), SessionError> {
        self.pending = None;
        let Some(joined) = self.joined.take() else {
            return Ok(());
        };
        match joined.handle.leave(self.member).await {
            Ok(_) | Err(RuntimeError::ChannelClosed) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn joined_to(&self, room_id: &str) -> Result<&Joined, SessionError> {
        let room = RoomId::parse(room_id)?;
        self.joined
            .as_ref()
            .filter(|j| j.handle.room() == &room)
            .ok_or_else(|| SessionError::NotJoined(room.to_string()))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(joined) = self.joined.take() else {
            return;
        };
        let member = self.member;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(err) = joined.handle.leave(member).await {
                        debug!("session {member}: leave on drop failed: {err}");
                    }
                });
            }
            Err(_) => warn!(
                "session {member} dropped outside a runtime, still listed in room {}",
                joined.handle.room()
            ),
        }
    }
}

/// `Some(None)` for an implicit target, `None` for text naming no operation.
fn parse_target(raw: Option<&str>) -> Option<Option<OpId>> {
    match raw {
        None => Some(None),
        Some(text) => OpId::parse(text).map(Some),
    }
}
