//! Room event stream payloads.

use crate::{
    op::Operation,
    stroke::{Point, Stroke},
    types::{MemberId, User},
};

/// Events broadcast by a room actor to everyone subscribed to the room.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// An operation was appended to the room log.
    Appended(Operation),
    /// A member began a stroke. Preview only, never logged.
    StrokeStarted {
        /// Connection drawing the stroke.
        from: MemberId,
        /// Author of the stroke.
        user: User,
        /// Opening metadata and points.
        stroke: Stroke,
    },
    /// A member extended its in-progress stroke. Preview only.
    StrokePoint {
        /// Connection drawing the stroke.
        from: MemberId,
        /// Author of the stroke.
        user: User,
        /// New sample.
        point: Point,
    },
    /// Room roster after a join or leave, in join order.
    Roster(Vec<User>),
}
