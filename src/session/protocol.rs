//! JSON messages exchanged between a connection and its session.

use serde::{Deserialize, Serialize};

use crate::{
    op::{Operation, Snapshot},
    stroke::{Point, Stroke},
    types::User,
};

/// Inbound message from a client connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Enter a room, leaving any previous one.
    Join {
        /// Room to enter.
        room_id: String,
        /// Identity used for every later action.
        user: User,
    },
    /// Leave a room.
    Leave {
        /// Room to leave.
        room_id: String,
    },
    /// Begin a stroke; relayed to other members as a preview.
    StartStroke {
        /// Room drawn in.
        room_id: String,
        /// Metadata and any initial points.
        stroke: Stroke,
    },
    /// Add a point to the stroke in progress.
    StrokePoint {
        /// Room drawn in.
        room_id: String,
        /// New sample.
        point: Point,
    },
    /// Complete the stroke. A full `stroke` overrides the buffered points.
    EndStroke {
        /// Room drawn in.
        room_id: String,
        /// Complete stroke, if the client sends it whole.
        #[serde(default)]
        stroke: Option<Stroke>,
    },
    /// Hide the most recent undoable stroke, or `target_op_id`.
    Undo {
        /// Room to act on.
        room_id: String,
        /// Explicit stroke to hide.
        #[serde(default)]
        target_op_id: Option<String>,
    },
    /// Restore the most recently hidden stroke, or `target_op_id`.
    Redo {
        /// Room to act on.
        room_id: String,
        /// Explicit stroke to restore.
        #[serde(default)]
        target_op_id: Option<String>,
    },
    /// Ask for the room's full log.
    RequestSnapshot {
        /// Room to read.
        room_id: String,
    },
}

/// Outbound message to a client connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Full room log to replay locally.
    Snapshot(Snapshot),
    /// An operation appended to the room log.
    Operation {
        /// The appended operation.
        op: Operation,
    },
    /// Another member began a stroke.
    StartStroke {
        /// Author.
        user: User,
        /// Opening metadata and points.
        stroke: Stroke,
    },
    /// Another member extended its stroke.
    StrokePoint {
        /// Author.
        user: User,
        /// New sample.
        point: Point,
    },
    /// Current room roster.
    UserList {
        /// Members in join order.
        users: Vec<User>,
    },
    /// An undo request found nothing to hide.
    NothingToUndo,
    /// A redo request found nothing to restore.
    NothingToRedo,
    /// The request was rejected.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

/// Decodes one inbound text frame.
pub fn decode(text: &str) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_str(text)
}

/// Encodes one outbound text frame.
pub fn encode(msg: &ServerMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}
