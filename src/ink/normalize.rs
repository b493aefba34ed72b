use crate::ink::error::{InkError, InkResult};
use crate::ink::geometry::{perpendicular_distance, PageSize, PixelPoint, Point};
use crate::ink::model::{Stroke, StrokeStyle};
use crate::ink::tool::normalize_pressure;

/// One pointer sample as delivered by the host, in page pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub x: f64,
    pub y: f64,
    pub pressure: f64,
    /// Milliseconds, any monotonic origin.
    pub timestamp: f64,
    pub tilt_x: Option<f64>,
    pub tilt_y: Option<f64>,
}

impl RawSample {
    pub fn new(x: f64, y: f64, pressure: f64, timestamp: f64) -> Self {
        Self {
            x,
            y,
            pressure,
            timestamp,
            tilt_x: None,
            tilt_y: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeOptions {
    pub style: StrokeStyle,
    pub simplify: bool,
    /// Douglas-Peucker tolerance in page pixels.
    pub epsilon: f64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            style: StrokeStyle::default(),
            simplify: true,
            epsilon: 0.5,
        }
    }
}

/// Turns a captured sample run into a committed stroke: time deltas,
/// optional simplification, normalized coordinates, bounds and a fresh id.
pub fn normalize_stroke(
    samples: &[RawSample],
    page: PageSize,
    options: &NormalizeOptions,
) -> InkResult<Stroke> {
    if samples.is_empty() {
        return Err(InkError::EmptyInput);
    }

    let pixel_points = samples_to_points(samples);
    let kept = if options.simplify {
        simplify_points(&pixel_points, options.epsilon)
    } else {
        pixel_points
    };

    let points = kept
        .into_iter()
        .map(|p| {
            let (x, y) = page.to_normalized(p.x, p.y);
            Point {
                x: x.clamp(0.0, 1.0),
                y: y.clamp(0.0, 1.0),
                ..p
            }
        })
        .collect();

    Ok(Stroke::new(options.style, points))
}

/// Pixel-space points with `dt` filled in from consecutive timestamps.
pub fn samples_to_points(samples: &[RawSample]) -> Vec<Point> {
    samples
        .iter()
        .enumerate()
        .map(|(index, sample)| {
            let dt = if index == 0 {
                0.0
            } else {
                (sample.timestamp - samples[index - 1].timestamp).max(0.0)
            };
            Point {
                x: sample.x,
                y: sample.y,
                pressure: normalize_pressure(sample.pressure),
                dt,
                tilt_x: sample.tilt_x,
                tilt_y: sample.tilt_y,
            }
        })
        .collect()
}

/// Douglas-Peucker simplification in whatever space `points` live in.
///
/// First and last points always survive, and re-running with the same
/// epsilon on the output returns it unchanged.
pub fn simplify_points(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    // Explicit work stack instead of recursion; long strokes stay off the call stack.
    let mut ranges = vec![(0usize, points.len() - 1)];
    while let Some((start, end)) = ranges.pop() {
        if end <= start + 1 {
            continue;
        }
        let a = as_pixel(&points[start]);
        let b = as_pixel(&points[end]);
        let mut max_distance = 0.0;
        let mut max_index = start;
        for (index, point) in points.iter().enumerate().take(end).skip(start + 1) {
            let distance = perpendicular_distance(as_pixel(point), a, b);
            if distance > max_distance {
                max_distance = distance;
                max_index = index;
            }
        }
        if max_distance > epsilon {
            keep[max_index] = true;
            ranges.push((start, max_index));
            ranges.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(point, kept)| kept.then_some(*point))
        .collect()
}

fn as_pixel(point: &Point) -> PixelPoint {
    PixelPoint::new(point.x, point.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ink::geometry::Bounds;

    const PAGE: PageSize = PageSize::new(800, 1000);

    fn samples(points: &[(f64, f64)]) -> Vec<RawSample> {
        points
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| RawSample::new(x, y, 0.5, 1000.0 + i as f64 * 16.0))
            .collect()
    }

    fn options(simplify: bool) -> NormalizeOptions {
        NormalizeOptions {
            simplify,
            ..NormalizeOptions::default()
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(
            normalize_stroke(&[], PAGE, &options(true)),
            Err(InkError::EmptyInput)
        );
    }

    #[test]
    fn dt_is_zero_for_first_sample_then_timestamp_delta() {
        let mut raw = samples(&[(0.0, 0.0), (10.0, 0.0), (20.0, 5.0)]);
        raw[2].timestamp += 4.0;
        let stroke = normalize_stroke(&raw, PAGE, &options(false)).unwrap();
        let dts: Vec<f64> = stroke.points().iter().map(|p| p.dt).collect();
        assert_eq!(dts, vec![0.0, 16.0, 20.0]);
    }

    #[test]
    fn far_off_middle_point_survives_simplification() {
        let raw = samples(&[(10.0, 10.0), (50.0, 50.0), (100.0, 10.0)]);
        let stroke = normalize_stroke(&raw, PAGE, &options(true)).unwrap();
        let xy: Vec<(f64, f64)> = stroke.points().iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(
            xy,
            vec![(10.0 / 800.0, 0.01), (50.0 / 800.0, 0.05), (100.0 / 800.0, 0.01)]
        );
    }

    #[test]
    fn near_collinear_points_collapse_to_endpoints() {
        let raw = samples(&[(0.0, 0.0), (10.0, 0.2), (20.0, -0.1), (30.0, 0.0)]);
        let stroke = normalize_stroke(&raw, PAGE, &options(true)).unwrap();
        assert_eq!(stroke.points().len(), 2);
        assert_eq!(stroke.points()[1].x, 30.0 / 800.0);
    }

    #[test]
    fn simplification_is_idempotent() {
        let points = samples_to_points(&samples(&[
            (0.0, 0.0),
            (3.0, 1.0),
            (6.0, -0.4),
            (9.0, 4.0),
            (12.0, 4.2),
            (15.0, 9.0),
            (18.0, 8.7),
            (21.0, 0.3),
            (24.0, 0.0),
        ]));
        for epsilon in [0.0, 0.3, 0.5, 1.0, 2.5, 10.0] {
            let once = simplify_points(&points, epsilon);
            let twice = simplify_points(&once, epsilon);
            assert_eq!(once, twice, "epsilon {epsilon}");
            assert_eq!(once.first(), points.first());
            assert_eq!(once.last(), points.last());
        }
    }

    #[test]
    fn bounds_are_tight_after_normalizing() {
        let raw = samples(&[(80.0, 100.0), (40.0, 900.0), (720.0, 300.0)]);
        let stroke = normalize_stroke(&raw, PAGE, &options(false)).unwrap();
        assert_eq!(*stroke.bounds(), Bounds::from_points(stroke.points()));
        assert_eq!(stroke.bounds().min_x, 0.05);
        assert_eq!(stroke.bounds().max_y, 0.9);
    }

    #[test]
    fn samples_past_the_page_edge_are_pinned_inside() {
        let raw = samples(&[(-30.0, 500.0), (400.0, 1200.0), (900.0, 10.0)]);
        let stroke = normalize_stroke(&raw, PAGE, &options(false)).unwrap();
        let xy: Vec<(f64, f64)> = stroke.points().iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(xy, vec![(0.0, 0.5), (0.5, 1.0), (1.0, 0.01)]);
        assert_eq!(stroke.bounds().max_x, 1.0);
    }

    #[test]
    fn single_sample_produces_dot_stroke() {
        let raw = samples(&[(400.0, 500.0)]);
        let stroke = normalize_stroke(&raw, PAGE, &options(true)).unwrap();
        assert_eq!(stroke.points().len(), 1);
        assert_eq!(stroke.bounds().min_x, stroke.bounds().max_x);
    }

    #[test]
    fn ids_increase_across_normalized_strokes() {
        let raw = samples(&[(1.0, 1.0), (2.0, 2.0)]);
        let first = normalize_stroke(&raw, PAGE, &options(true)).unwrap();
        let second = normalize_stroke(&raw, PAGE, &options(true)).unwrap();
        assert!(second.id() > first.id());
    }
}
