use crate::{
    op::{OpAction, Operation},
    types::OpId,
};

/// Room-global undo and redo stacks of stroke ids.
///
/// `undo` holds strokes that are visible and can be hidden, `redo` holds
/// strokes that are hidden and can be restored. An id lives in at most one
/// of the two, at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoStacks {
    undo: Vec<OpId>,
    redo: Vec<OpId>,
}

impl UndoStacks {
    /// Empty stacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the stacks a room holds after appending exactly `log`.
    ///
    /// Clients use this to pick explicit undo/redo targets from a snapshot.
    pub fn from_log<'a>(log: impl IntoIterator<Item = &'a Operation>) -> Self {
        let mut stacks = Self::new();
        for op in log {
            stacks.apply(op);
        }
        stacks
    }

    /// Folds one logged operation into the stacks.
    pub fn apply(&mut self, op: &Operation) {
        match op.action {
            OpAction::Stroke(_) => self.push_stroke(op.op_id),
            OpAction::Undo { target } => {
                self.take_undo(Some(target));
            }
            OpAction::Redo { target } => {
                self.take_redo(Some(target));
            }
        }
    }

    /// Records a new stroke. Drops the whole redo history.
    pub fn push_stroke(&mut self, id: OpId) {
        self.undo.push(id);
        self.redo.clear();
    }

    /// Moves a stroke from the undo stack onto the redo stack.
    ///
    /// `None` pops the top; `Some(id)` removes the most recent occurrence.
    pub fn take_undo(&mut self, target: Option<OpId>) -> Option<OpId> {
        let id = take(&mut self.undo, target)?;
        self.redo.push(id);
        Some(id)
    }

    /// Moves a stroke from the redo stack back onto the undo stack.
    pub fn take_redo(&mut self, target: Option<OpId>) -> Option<OpId> {
        let id = take(&mut self.redo, target)?;
        self.undo.push(id);
        Some(id)
    }

    /// Stroke a plain undo would hide.
    pub fn undo_target(&self) -> Option<OpId> {
        self.undo.last().copied()
    }

    /// Stroke a plain redo would restore.
    pub fn redo_target(&self) -> Option<OpId> {
        self.redo.last().copied()
    }

    /// Undoable stroke ids, oldest first.
    pub fn undo_ids(&self) -> &[OpId] {
        &self.undo
    }

    /// Redoable stroke ids, oldest first.
    pub fn redo_ids(&self) -> &[OpId] {
        &self.redo
    }
}

fn take(stack: &mut Vec<OpId>, target: Option<OpId>) -> Option<OpId> {
    match target {
        None => stack.pop(),
        Some(id) => {
            let pos = stack.iter().rposition(|x| *x == id)?;
            Some(stack.remove(pos))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targeted_take_removes_most_recent_occurrence_only() {
        let (a, b) = (OpId::new(), OpId::new());
        let mut stacks = UndoStacks::new();
        stacks.push_stroke(a);
        stacks.push_stroke(b);

        assert_eq!(stacks.take_undo(Some(a)), Some(a));
        assert_eq!(stacks.undo_ids(), &[b]);
        assert_eq!(stacks.redo_ids(), &[a]);
        assert_eq!(stacks.take_undo(Some(a)), None);
    }

    #[test]
    fn new_stroke_clears_redo() {
        let (a, b) = (OpId::new(), OpId::new());
        let mut stacks = UndoStacks::new();
        stacks.push_stroke(a);
        stacks.take_undo(None);
        stacks.push_stroke(b);

        assert_eq!(stacks.redo_target(), None);
        assert_eq!(stacks.take_redo(None), None);
        assert_eq!(stacks.undo_target(), Some(b));
    }
}
