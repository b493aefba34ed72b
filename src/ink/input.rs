use crate::ink::geometry::{PageSize, Point};
use crate::ink::model::StrokeStyle;
use crate::ink::normalize::{samples_to_points, RawSample};

pub type PointerId = u32;

/// Transient state of one pointer drag, owned by [`DragInput`] until the
/// pointer lifts and then handed to the commit step by value.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pointer_id: PointerId,
    style: StrokeStyle,
    samples: Vec<RawSample>,
}

impl DragSession {
    fn new(pointer_id: PointerId, style: StrokeStyle, first: RawSample) -> Self {
        Self {
            pointer_id,
            style,
            samples: vec![first],
        }
    }

    pub fn pointer_id(&self) -> PointerId {
        self.pointer_id
    }

    pub fn style(&self) -> StrokeStyle {
        self.style
    }

    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    /// Captured samples as normalized points, unsimplified.
    pub fn points(&self, page: PageSize) -> Vec<Point> {
        samples_to_points(&self.samples)
            .into_iter()
            .map(|p| {
                let (x, y) = page.to_normalized(p.x, p.y);
                Point { x, y, ..p }
            })
            .collect()
    }

    fn push(&mut self, sample: RawSample) {
        if self.samples.last() != Some(&sample) {
            self.samples.push(sample);
        }
    }
}

/// Single-drag pointer tracker. While a drag is active, events from any
/// other pointer are ignored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DragInput {
    active: Option<DragSession>,
}

impl DragInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&DragSession> {
        self.active.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    /// Returns `false` when the event was ignored.
    pub fn pointer_down(&mut self, pointer_id: PointerId, sample: RawSample, style: StrokeStyle) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some(DragSession::new(pointer_id, style, sample));
        true
    }

    pub fn pointer_move(&mut self, pointer_id: PointerId, sample: RawSample) -> bool {
        match self.active.as_mut() {
            Some(session) if session.pointer_id == pointer_id => {
                session.push(sample);
                true
            }
            _ => false,
        }
    }

    /// Ends the drag with a final sample and hands the session to the caller.
    pub fn pointer_up(&mut self, pointer_id: PointerId, sample: RawSample) -> Option<DragSession> {
        if !self.pointer_move(pointer_id, sample) {
            return None;
        }
        self.active.take()
    }

    /// Cancellation commits whatever was captured, same as a lift.
    pub fn pointer_cancel(&mut self, pointer_id: PointerId) -> Option<DragSession> {
        match &self.active {
            Some(session) if session.pointer_id == pointer_id => self.active.take(),
            _ => None,
        }
    }

    /// Drops the active drag without committing it.
    pub fn abandon(&mut self) -> Option<DragSession> {
        self.active.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f64, t: f64) -> RawSample {
        RawSample::new(x, 10.0, 0.5, t)
    }

    #[test]
    fn down_move_up_hands_back_full_session() {
        let mut input = DragInput::new();
        assert!(input.pointer_down(1, sample(0.0, 0.0), StrokeStyle::default()));
        assert!(input.pointer_move(1, sample(5.0, 8.0)));
        let session = input.pointer_up(1, sample(9.0, 16.0)).unwrap();
        assert_eq!(session.samples().len(), 3);
        assert!(!input.is_dragging());
    }

    #[test]
    fn secondary_pointer_is_ignored_mid_drag() {
        let mut input = DragInput::new();
        input.pointer_down(1, sample(0.0, 0.0), StrokeStyle::default());
        assert!(!input.pointer_down(2, sample(50.0, 1.0), StrokeStyle::default()));
        assert!(!input.pointer_move(2, sample(60.0, 2.0)));
        assert_eq!(input.pointer_up(2, sample(70.0, 3.0)), None);
        assert_eq!(input.pointer_cancel(2), None);
        assert_eq!(input.active().unwrap().samples().len(), 1);
    }

    #[test]
    fn cancel_returns_captured_samples() {
        let mut input = DragInput::new();
        input.pointer_down(3, sample(0.0, 0.0), StrokeStyle::default());
        input.pointer_move(3, sample(4.0, 8.0));
        let session = input.pointer_cancel(3).unwrap();
        assert_eq!(session.pointer_id(), 3);
        assert_eq!(session.samples().len(), 2);
    }

    #[test]
    fn repeated_identical_samples_are_collapsed() {
        let mut input = DragInput::new();
        input.pointer_down(1, sample(0.0, 0.0), StrokeStyle::default());
        input.pointer_move(1, sample(0.0, 0.0));
        let session = input.pointer_up(1, sample(0.0, 0.0)).unwrap();
        assert_eq!(session.samples().len(), 1);
    }

    #[test]
    fn session_points_are_normalized() {
        let mut input = DragInput::new();
        input.pointer_down(1, RawSample::new(400.0, 500.0, 0.0, 0.0), StrokeStyle::default());
        let points = input.active().unwrap().points(PageSize::new(800, 1000));
        assert_eq!((points[0].x, points[0].y, points[0].pressure), (0.5, 0.5, 1.0));
    }
}
