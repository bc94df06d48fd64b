//! Operation model, wire shape and room snapshots.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    stroke::Stroke,
    types::{OpId, TimestampMs, User},
};

/// Wire-level operation that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// The payload shape does not belong to the declared `type`.
    #[error("payload does not match operation type `{0}`")]
    PayloadMismatch(OpKind),
}

/// Discriminant of an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    /// A completed stroke.
    Stroke,
    /// Hides a stroke.
    Undo,
    /// Restores a hidden stroke.
    Redo,
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Stroke => "stroke",
            Self::Undo => "undo",
            Self::Redo => "redo",
        })
    }
}

/// What an operation does to the room.
#[derive(Debug, Clone, PartialEq)]
pub enum OpAction {
    /// Draws a stroke.
    Stroke(Stroke),
    /// Hides the stroke created by `target`.
    Undo {
        /// Stroke operation being hidden.
        target: OpId,
    },
    /// Restores the stroke created by `target`.
    Redo {
        /// Stroke operation being restored.
        target: OpId,
    },
}

/// Immutable record of one room-affecting action.
///
/// Log position, not `timestamp`, orders operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireOperation", into = "WireOperation")]
pub struct Operation {
    /// Unique id assigned at creation.
    pub op_id: OpId,
    /// Actor that caused the operation.
    pub user: User,
    /// Creation time in epoch milliseconds.
    pub timestamp: TimestampMs,
    /// Operation body.
    pub action: OpAction,
}

impl Operation {
    /// Creates an operation with a fresh id, stamped now.
    pub fn new(user: User, action: OpAction) -> Self {
        Self {
            op_id: OpId::new(),
            user,
            timestamp: now_ms(),
            action,
        }
    }

    /// Operation discriminant.
    pub fn kind(&self) -> OpKind {
        match self.action {
            OpAction::Stroke(_) => OpKind::Stroke,
            OpAction::Undo { .. } => OpKind::Undo,
            OpAction::Redo { .. } => OpKind::Redo,
        }
    }

    /// Target stroke of an undo or redo.
    pub fn target(&self) -> Option<OpId> {
        match self.action {
            OpAction::Stroke(_) => None,
            OpAction::Undo { target } | OpAction::Redo { target } => Some(target),
        }
    }

    /// Stroke carried by a stroke operation.
    pub fn stroke(&self) -> Option<&Stroke> {
        match &self.action {
            OpAction::Stroke(stroke) => Some(stroke),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOperation {
    op_id: OpId,
    #[serde(rename = "type")]
    kind: OpKind,
    user: User,
    #[serde(alias = "ts")]
    timestamp: TimestampMs,
    payload: WirePayload,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WirePayload {
    Stroke {
        stroke: Stroke,
    },
    Target {
        #[serde(rename = "targetOpId")]
        target_op_id: OpId,
    },
}

impl TryFrom<WireOperation> for Operation {
    type Error = OperationError;

    fn try_from(wire: WireOperation) -> Result<Self, Self::Error> {
        let action = match (wire.kind, wire.payload) {
            (OpKind::Stroke, WirePayload::Stroke { stroke }) => OpAction::Stroke(stroke),
            (OpKind::Undo, WirePayload::Target { target_op_id }) => OpAction::Undo {
                target: target_op_id,
            },
            (OpKind::Redo, WirePayload::Target { target_op_id }) => OpAction::Redo {
                target: target_op_id,
            },
            (kind, _) => return Err(OperationError::PayloadMismatch(kind)),
        };
        Ok(Self {
            op_id: wire.op_id,
            user: wire.user,
            timestamp: wire.timestamp,
            action,
        })
    }
}

impl From<Operation> for WireOperation {
    fn from(op: Operation) -> Self {
        let kind = op.kind();
        let payload = match op.action {
            OpAction::Stroke(stroke) => WirePayload::Stroke { stroke },
            OpAction::Undo { target } | OpAction::Redo { target } => WirePayload::Target {
                target_op_id: target,
            },
        };
        Self {
            op_id: op.op_id,
            kind,
            user: op.user,
            timestamp: op.timestamp,
            payload,
        }
    }
}

/// Full room log sent to a client for local replay.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Every operation of the room in append order.
    pub op_log: Vec<Operation>,
}

pub(crate) fn now_ms() -> TimestampMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
