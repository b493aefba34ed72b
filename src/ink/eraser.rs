use crate::ink::geometry::{distance_point_to_segment, Bounds, PageSize, PixelPoint, Point};
use crate::ink::model::{StrokeRef, StrokeSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EraserMode {
    /// Any hit removes the whole stroke.
    WholeStroke,
    /// Hit points are cut out and the surviving runs become new strokes.
    #[default]
    Partial,
}

#[derive(Debug, Clone)]
pub struct EraseOutcome {
    pub changed: bool,
    pub next_strokes: StrokeSet,
}

/// Applies one captured eraser path to `strokes` in a single pass.
///
/// Strokes that are not hit are carried over as the same allocation, and when
/// nothing is hit at all the returned set shares storage with the input.
/// Only stroke points are tested against the eraser polyline, so a fast
/// eraser can slip between two widely spaced stroke points.
pub fn erase_strokes(
    strokes: &StrokeSet,
    eraser_path: &[Point],
    mode: EraserMode,
    radius_px: f64,
    page: PageSize,
) -> EraseOutcome {
    let unchanged = || EraseOutcome {
        changed: false,
        next_strokes: strokes.clone(),
    };
    if eraser_path.len() < 2 {
        return unchanged();
    }

    let reach = Bounds::from_points(eraser_path).inflate_px(radius_px, page);
    let eraser: Vec<PixelPoint> = eraser_path.iter().map(|p| page.to_pixels(p)).collect();

    let mut changed = false;
    let mut next: Vec<StrokeRef> = Vec::with_capacity(strokes.len());

    for stroke in strokes.iter() {
        if !reach.intersects(stroke.bounds()) {
            next.push(Arc::clone(stroke));
            continue;
        }

        match mode {
            EraserMode::WholeStroke => {
                let hit = stroke
                    .points()
                    .iter()
                    .any(|p| is_near_eraser(page.to_pixels(p), &eraser, radius_px));
                if hit {
                    changed = true;
                } else {
                    next.push(Arc::clone(stroke));
                }
            }
            EraserMode::Partial => {
                let mut runs: Vec<Vec<Point>> = Vec::new();
                let mut current: Vec<Point> = Vec::new();
                let mut any_hit = false;
                for point in stroke.points() {
                    if is_near_eraser(page.to_pixels(point), &eraser, radius_px) {
                        any_hit = true;
                        if !current.is_empty() {
                            runs.push(std::mem::take(&mut current));
                        }
                    } else {
                        current.push(*point);
                    }
                }
                if !current.is_empty() {
                    runs.push(current);
                }

                if !any_hit {
                    next.push(Arc::clone(stroke));
                    continue;
                }
                changed = true;
                next.extend(
                    runs.into_iter()
                        .filter(|run| run.len() >= 2)
                        .map(|run| Arc::new(stroke.fragment(run))),
                );
            }
        }
    }

    if !changed {
        return unchanged();
    }
    EraseOutcome {
        changed,
        next_strokes: StrokeSet::new(next),
    }
}

fn is_near_eraser(point: PixelPoint, eraser: &[PixelPoint], radius_px: f64) -> bool {
    eraser
        .windows(2)
        .any(|seg| distance_point_to_segment(point, seg[0], seg[1]) <= radius_px)
}
