use crate::ink::model::StrokeSet;

/// One committed edit as whole-set snapshots.
#[derive(Debug, Clone)]
pub struct Command {
    pub before: StrokeSet,
    pub after: StrokeSet,
}

/// Linear undo/redo over stroke-set snapshots. Pushing is O(1) because the
/// snapshots share their stroke arrays.
#[derive(Debug, Clone, Default)]
pub struct UndoLog {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    limit: Option<usize>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `limit` undo steps; the oldest are dropped first.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn push(&mut self, before: StrokeSet, after: StrokeSet) {
        self.undo_stack.push(Command { before, after });
        self.redo_stack.clear();
        if let Some(limit) = self.limit {
            if self.undo_stack.len() > limit {
                let excess = self.undo_stack.len() - limit;
                self.undo_stack.drain(..excess);
            }
        }
    }

    /// Returns the snapshot to restore, or `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<StrokeSet> {
        let command = self.undo_stack.pop()?;
        let before = command.before.clone();
        self.redo_stack.push(command);
        Some(before)
    }

    pub fn redo(&mut self) -> Option<StrokeSet> {
        let command = self.redo_stack.pop()?;
        let after = command.after.clone();
        self.undo_stack.push(command);
        Some(after)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ink::geometry::Point;
    use crate::ink::model::{Stroke, StrokeStyle};
    use std::sync::Arc;

    fn stroke(x: f64) -> Arc<Stroke> {
        Arc::new(Stroke::new(
            StrokeStyle::default(),
            vec![Point::new(x, 0.1, 1.0, 0.0), Point::new(x, 0.2, 1.0, 16.0)],
        ))
    }

    #[test]
    fn new_push_clears_redo_stack() {
        let a = stroke(0.1);
        let b = stroke(0.2);
        let only_a = StrokeSet::new(vec![Arc::clone(&a)]);
        let a_and_b = only_a.with_stroke(Arc::clone(&b));

        let mut log = UndoLog::new();
        log.push(only_a.clone(), a_and_b.clone());
        assert!(log.undo().unwrap().same_content(&only_a));
        assert!(log.redo().unwrap().same_content(&a_and_b));

        log.undo();
        assert_eq!(log.redo_len(), 1);
        log.push(a_and_b.clone(), only_a.clone());
        assert_eq!(log.redo_len(), 0);
        assert_eq!(log.redo().map(|set| set.len()), None);
    }

    #[test]
    fn undo_and_redo_walk_the_stack_in_order() {
        let empty = StrokeSet::empty();
        let one = empty.with_stroke(stroke(0.1));
        let two = one.with_stroke(stroke(0.2));

        let mut log = UndoLog::new();
        log.push(empty.clone(), one.clone());
        log.push(one.clone(), two.clone());

        assert!(log.undo().unwrap().ptr_eq(&one));
        assert!(log.undo().unwrap().ptr_eq(&empty));
        assert!(log.undo().is_none());
        assert!(log.redo().unwrap().ptr_eq(&one));
        assert!(log.redo().unwrap().ptr_eq(&two));
        assert!(log.redo().is_none());
    }

    #[test]
    fn limit_drops_oldest_commands() {
        let mut log = UndoLog::with_limit(Some(2));
        let mut current = StrokeSet::empty();
        for i in 0..4 {
            let next = current.with_stroke(stroke(0.1 * f64::from(i)));
            log.push(current, next.clone());
            current = next;
        }
        assert_eq!(log.undo_len(), 2);
        assert_eq!(log.undo().unwrap().len(), 3);
        assert_eq!(log.undo().unwrap().len(), 2);
        assert!(!log.can_undo());
    }
}
