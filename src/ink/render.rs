use crate::ink::geometry::{PageSize, PixelPoint, Point};
use crate::ink::model::{Stroke, StrokeStyle, Tool};
use crate::ink::raster::{flatten_quad, CompositeOp, Paint, PaintContext};
use crate::ink::tool::{pressure_curve, smooth_pressure, velocity};

/// Width in pixels of the segment ending at `curr`.
pub fn render_width(style: &StrokeStyle, prev: &Point, curr: &Point, page: PageSize) -> f64 {
    let params = style.tool.params();
    let pressure = smooth_pressure(prev.pressure, curr.pressure);
    let pressure_factor = if params.use_pressure_for_width {
        pressure_curve(pressure, params.pressure_gamma)
    } else {
        1.0
    };
    let velocity_factor = if params.use_velocity {
        1.0 / (1.0 + velocity(prev, curr, page) * params.velocity_k)
    } else {
        1.0
    };
    style.base_width * params.tool_factor * pressure_factor * velocity_factor
}

/// Highlighter ink gets lighter with less pressure; everything else is opaque.
pub fn render_alpha(style: &StrokeStyle, prev: &Point, curr: &Point) -> f64 {
    if style.tool != Tool::Highlighter {
        return 1.0;
    }
    let pressure = smooth_pressure(prev.pressure, curr.pressure);
    (0.3 + 0.4 * pressure).clamp(0.3, 1.0)
}

fn paint_for(style: &StrokeStyle, alpha: f64) -> Paint {
    match style.tool {
        Tool::Eraser => Paint {
            color: [0, 0, 0, 255],
            alpha,
            op: CompositeOp::DestinationOut,
        },
        _ => Paint {
            color: style.color.to_rgba_array(),
            alpha,
            op: CompositeOp::SourceOver,
        },
    }
}

pub fn draw_stroke(ctx: &mut PaintContext<'_>, stroke: &Stroke, page: PageSize) -> u64 {
    draw_points(ctx, &stroke.style(), stroke.points(), page)
}

/// Draws a full point run with quadratic midpoint smoothing: every interior
/// point is the control of a curve between the midpoints of its two
/// neighbouring segments.
pub fn draw_points(
    ctx: &mut PaintContext<'_>,
    style: &StrokeStyle,
    points: &[Point],
    page: PageSize,
) -> u64 {
    match points {
        [] => 0,
        [only] => draw_dot(ctx, style, only, page),
        [a, b] => draw_line(ctx, style, a, b, page),
        _ => points
            .windows(3)
            .map(|w| draw_smoothed(ctx, style, &w[0], &w[1], &w[2], page))
            .sum(),
    }
}

/// Draws only the newest piece of an in-progress run, for live feedback.
pub fn draw_live_segment(
    ctx: &mut PaintContext<'_>,
    style: &StrokeStyle,
    points: &[Point],
    page: PageSize,
) -> u64 {
    match points {
        [] => 0,
        [only] => draw_dot(ctx, style, only, page),
        [a, b] => draw_line(ctx, style, a, b, page),
        [.., p0, p1, p2] => draw_smoothed(ctx, style, p0, p1, p2, page),
    }
}

fn draw_dot(ctx: &mut PaintContext<'_>, style: &StrokeStyle, p: &Point, page: PageSize) -> u64 {
    let width = render_width(style, p, p, page);
    let paint = paint_for(style, render_alpha(style, p, p));
    ctx.stroke_path(&[page.to_pixels(p)], width, paint)
}

fn draw_line(
    ctx: &mut PaintContext<'_>,
    style: &StrokeStyle,
    a: &Point,
    b: &Point,
    page: PageSize,
) -> u64 {
    let width = render_width(style, a, b, page);
    let paint = paint_for(style, render_alpha(style, a, b));
    ctx.stroke_path(&[page.to_pixels(a), page.to_pixels(b)], width, paint)
}

fn draw_smoothed(
    ctx: &mut PaintContext<'_>,
    style: &StrokeStyle,
    p0: &Point,
    p1: &Point,
    p2: &Point,
    page: PageSize,
) -> u64 {
    let start = page.midpoint(p0, p1);
    let end = page.midpoint(p1, p2);
    let control: PixelPoint = page.to_pixels(p1);
    let width = render_width(style, p0, p1, page);
    let paint = paint_for(style, render_alpha(style, p0, p1));
    ctx.stroke_path(&flatten_quad(start, control, end), width, paint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ink::model::ColorRgba;
    use crate::ink::raster::RgbaBuffer;

    const PAGE: PageSize = PageSize::new(100, 100);

    fn style(tool: Tool) -> StrokeStyle {
        StrokeStyle {
            tool,
            color: ColorRgba::rgba(200, 0, 0, 255),
            base_width: 4.0,
        }
    }

    fn pt(x: f64, y: f64, pressure: f64, dt: f64) -> Point {
        Point::new(x, y, pressure, dt)
    }

    #[test]
    fn pen_width_combines_pressure_and_velocity() {
        let prev = pt(0.0, 0.0, 1.0, 0.0);
        let curr = pt(0.3, 0.4, 1.0, 10.0);
        // 50px over 10ms => 5 px/ms; 1 / (1 + 5 * 0.003)
        let expected = 4.0 / (1.0 + 5.0 * 0.003);
        assert!((render_width(&style(Tool::Pen), &prev, &curr, PAGE) - expected).abs() < 1e-9);
    }

    #[test]
    fn marker_width_uses_its_gamma_and_factor() {
        let prev = pt(0.5, 0.5, 0.5, 0.0);
        let curr = pt(0.5, 0.5, 0.5, 16.0);
        let expected = 4.0 * 0.8 * 0.5f64.powf(0.85);
        assert!((render_width(&style(Tool::Marker), &prev, &curr, PAGE) - expected).abs() < 1e-9);
    }

    #[test]
    fn highlighter_width_ignores_pressure_and_velocity() {
        let prev = pt(0.0, 0.0, 0.1, 0.0);
        let curr = pt(1.0, 1.0, 0.1, 1.0);
        assert_eq!(render_width(&style(Tool::Highlighter), &prev, &curr, PAGE), 4.0);
    }

    #[test]
    fn highlighter_alpha_tracks_smoothed_pressure() {
        let s = style(Tool::Highlighter);
        let a = render_alpha(&s, &pt(0.0, 0.0, 1.0, 0.0), &pt(0.0, 0.0, 1.0, 0.0));
        assert!((a - 0.7).abs() < 1e-9);
        let low = render_alpha(&s, &pt(0.0, 0.0, 0.1, 0.0), &pt(0.0, 0.0, 0.1, 0.0));
        assert!((low - 0.34).abs() < 1e-9);
        assert_eq!(render_alpha(&style(Tool::Pen), &pt(0.0, 0.0, 0.1, 0.0), &pt(0.0, 0.0, 0.1, 0.0)), 1.0);
    }

    #[test]
    fn single_point_stroke_renders_visible_dot() {
        let mut buffer = RgbaBuffer::new(100, 100);
        let stroke = Stroke::new(style(Tool::Pen), vec![pt(0.5, 0.5, 1.0, 0.0)]);
        let mut ctx = PaintContext::new(&mut buffer).unwrap();
        assert!(draw_stroke(&mut ctx, &stroke, PAGE) > 0);
        assert_eq!(buffer.pixel(50, 50), [200, 0, 0, 255]);
    }

    #[test]
    fn smoothed_stroke_skips_outer_half_segments() {
        let mut buffer = RgbaBuffer::new(100, 100);
        let stroke = Stroke::new(
            style(Tool::Pen),
            vec![
                pt(0.1, 0.5, 1.0, 0.0),
                pt(0.5, 0.5, 1.0, 16.0),
                pt(0.9, 0.5, 1.0, 16.0),
            ],
        );
        let mut ctx = PaintContext::new(&mut buffer).unwrap();
        draw_stroke(&mut ctx, &stroke, PAGE);
        // Curve runs between midpoints (30,50) and (70,50).
        assert_eq!(buffer.pixel(50, 49)[3], 255);
        assert_eq!(buffer.pixel(12, 50)[3], 0);
    }

    #[test]
    fn live_segment_draws_only_the_newest_curve() {
        let points = vec![
            pt(0.1, 0.1, 1.0, 0.0),
            pt(0.2, 0.1, 1.0, 16.0),
            pt(0.3, 0.1, 1.0, 16.0),
            pt(0.4, 0.6, 1.0, 16.0),
            pt(0.5, 0.9, 1.0, 16.0),
        ];
        let mut buffer = RgbaBuffer::new(100, 100);
        let mut ctx = PaintContext::new(&mut buffer).unwrap();
        draw_live_segment(&mut ctx, &style(Tool::Pen), &points, PAGE);
        assert_eq!(buffer.pixel(15, 10)[3], 0);
        assert!(buffer.non_transparent_pixels() > 0);
    }

    #[test]
    fn eraser_preview_cuts_through_ink() {
        let mut buffer = RgbaBuffer::filled(100, 100, [0, 0, 0, 255]);
        let mut ctx = PaintContext::new(&mut buffer).unwrap();
        draw_live_segment(
            &mut ctx,
            &style(Tool::Eraser),
            &[pt(0.2, 0.5, 1.0, 0.0), pt(0.8, 0.5, 1.0, 16.0)],
            PAGE,
        );
        assert_eq!(buffer.pixel(50, 50)[3], 0);
        assert_eq!(buffer.pixel(50, 10)[3], 255);
    }
}
