use hashbrown::HashMap;

use crate::{
    engine::replay::{VisibleStroke, replay},
    op::{OpAction, Operation, now_ms},
    stroke::Stroke,
    types::{OpId, TimestampMs, User},
};

use super::stacks::UndoStacks;

/// One room's append-only log plus its undo/redo stacks.
#[derive(Debug, Clone, Default)]
pub struct RoomState {
    log: Vec<Operation>,
    pos: HashMap<OpId, usize>,
    stacks: UndoStacks,
    last_activity_ms: TimestampMs,
}

impl RoomState {
    pub fn new() -> Self {
        Self {
            last_activity_ms: now_ms(),
            ..Self::default()
        }
    }

    /// Appends to the tail of the log. Entries are never removed.
    pub fn append(&mut self, op: Operation) {
        self.pos.insert(op.op_id, self.log.len());
        self.log.push(op);
        self.touch();
    }

    pub fn record_stroke(&mut self, user: User, stroke: Stroke) -> Operation {
        let op = Operation::new(user, OpAction::Stroke(stroke));
        self.stacks.push_stroke(op.op_id);
        self.append(op.clone());
        op
    }

    /// Hides a stroke. `None` when the undo stack is empty or lacks `target`.
    pub fn undo(&mut self, user: User, target: Option<OpId>) -> Option<Operation> {
        let target = self.stacks.take_undo(target)?;
        let op = Operation::new(user, OpAction::Undo { target });
        self.append(op.clone());
        Some(op)
    }

    /// Restores a hidden stroke. `None` when the redo stack is empty or lacks `target`.
    pub fn redo(&mut self, user: User, target: Option<OpId>) -> Option<Operation> {
        let target = self.stacks.take_redo(target)?;
        let op = Operation::new(user, OpAction::Redo { target });
        self.append(op.clone());
        Some(op)
    }

    /// Log entry a plain undo would hide.
    pub fn last_undoable(&self) -> Option<&Operation> {
        let id = self.stacks.undo_target()?;
        self.get(id)
    }

    pub fn get(&self, id: OpId) -> Option<&Operation> {
        self.pos.get(&id).and_then(|idx| self.log.get(*idx))
    }

    pub fn log(&self) -> &[Operation] {
        &self.log
    }

    pub fn replay(&self) -> Vec<VisibleStroke> {
        replay(&self.log)
    }

    /// Last `n` operations, newest last.
    pub fn recent(&self, n: usize) -> &[Operation] {
        let start = self.log.len().saturating_sub(n);
        &self.log[start..]
    }

    pub fn stacks(&self) -> &UndoStacks {
        &self.stacks
    }

    pub fn last_activity_ms(&self) -> TimestampMs {
        self.last_activity_ms
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity_ms = self.last_activity_ms.max(now_ms());
    }
}
