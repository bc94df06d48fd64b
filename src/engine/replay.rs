use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{
    op::{OpAction, Operation},
    stroke::Stroke,
    types::{OpId, User},
};

/// A stroke currently on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleStroke {
    /// Stroke operation that drew it.
    pub op_id: OpId,
    /// Author of the stroke.
    pub user: User,
    /// Stroke geometry and style.
    pub stroke: Stroke,
}

/// Visible strokes in draw order, built one operation at a time.
///
/// Folding a log through [`Timeline::apply`] is exactly [`replay`].
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    strokes: Vec<VisibleStroke>,
    known: HashMap<OpId, VisibleStroke>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, op: &Operation) {
        match &op.action {
            OpAction::Stroke(stroke) => {
                let item = VisibleStroke {
                    op_id: op.op_id,
                    user: op.user.clone(),
                    stroke: stroke.clone(),
                };
                self.known.insert(op.op_id, item.clone());
                self.strokes.push(item);
            }
            OpAction::Undo { target } => {
                // Unknown targets leave the timeline untouched.
                if let Some(pos) = self.strokes.iter().rposition(|s| s.op_id == *target) {
                    self.strokes.remove(pos);
                }
            }
            OpAction::Redo { target } => {
                // Redo re-draws on top rather than at the original depth.
                if let Some(item) = self.known.get(target) {
                    self.strokes.push(item.clone());
                }
            }
        }
    }

    pub fn strokes(&self) -> &[VisibleStroke] {
        &self.strokes
    }

    pub fn into_strokes(self) -> Vec<VisibleStroke> {
        self.strokes
    }
}

/// Reduces a log to the strokes currently visible, bottom first.
///
/// Pure and total: any well-typed log replays, dangling targets are skipped.
pub fn replay<'a>(log: impl IntoIterator<Item = &'a Operation>) -> Vec<VisibleStroke> {
    let mut timeline = Timeline::new();
    for op in log {
        timeline.apply(op);
    }
    timeline.into_strokes()
}
