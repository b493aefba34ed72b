use serde::{Deserialize, Serialize};

/// A stroke sample in normalized page coordinates.
///
/// `x` and `y` are fractions of the page width and height, so a page can be
/// resized without touching stored point data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub pressure: f64,
    /// Milliseconds since the previous point (0 for the first).
    pub dt: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tilt_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tilt_y: Option<f64>,
}

impl Point {
    pub fn new(x: f64, y: f64, pressure: f64, dt: f64) -> Self {
        Self {
            x,
            y,
            pressure,
            dt,
            tilt_x: None,
            tilt_y: None,
        }
    }
}

/// Pixel dimensions that define the normalized-to-pixel mapping of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

impl PageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn to_pixels(self, point: &Point) -> PixelPoint {
        PixelPoint {
            x: point.x * f64::from(self.width),
            y: point.y * f64::from(self.height),
        }
    }

    pub fn to_normalized(self, x: f64, y: f64) -> (f64, f64) {
        (
            x / f64::from(self.width.max(1)),
            y / f64::from(self.height.max(1)),
        )
    }

    pub fn bounds_to_pixels(self, bounds: &Bounds) -> PixelBounds {
        let w = f64::from(self.width);
        let h = f64::from(self.height);
        PixelBounds {
            min_x: bounds.min_x * w,
            min_y: bounds.min_y * h,
            max_x: bounds.max_x * w,
            max_y: bounds.max_y * h,
        }
    }

    /// Canvas-space midpoint of two normalized points.
    pub fn midpoint(self, a: &Point, b: &Point) -> PixelPoint {
        PixelPoint {
            x: (a.x + b.x) * 0.5 * f64::from(self.width),
            y: (a.y + b.y) * 0.5 * f64::from(self.height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: PixelPoint) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Axis-aligned box in normalized space. Degenerate boxes (a single point)
/// are legal.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn from_point(point: &Point) -> Self {
        Self {
            min_x: point.x,
            min_y: point.y,
            max_x: point.x,
            max_y: point.y,
        }
    }

    /// Tight box around `points`; an empty slice yields the zero box.
    pub fn from_points(points: &[Point]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        points.iter().skip(1).fold(Self::from_point(first), |mut acc, p| {
            acc.expand(p);
            acc
        })
    }

    pub fn expand(&mut self, point: &Point) {
        self.min_x = self.min_x.min(point.x);
        self.min_y = self.min_y.min(point.y);
        self.max_x = self.max_x.max(point.x);
        self.max_y = self.max_y.max(point.y);
    }

    /// Grows the box by a pixel radius, converted per axis into normalized units.
    pub fn inflate_px(&self, radius_px: f64, page: PageSize) -> Self {
        let rx = radius_px / f64::from(page.width.max(1));
        let ry = radius_px / f64::from(page.height.max(1));
        Self {
            min_x: self.min_x - rx,
            min_y: self.min_y - ry,
            max_x: self.max_x + rx,
            max_y: self.max_y + ry,
        }
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        !(self.max_x < other.min_x
            || self.min_x > other.max_x
            || self.max_y < other.min_y
            || self.min_y > other.max_y)
    }

    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }
}

/// Whether a circle of `radius_px` around `center` touches `bounds`.
///
/// The radius is converted into normalized units per axis, so on a
/// non-square page the tested region is an axis-aligned box around an
/// ellipse rather than a true circle.
pub fn bounds_intersect_circle(
    bounds: &Bounds,
    center: &Point,
    radius_px: f64,
    page: PageSize,
) -> bool {
    Bounds::from_point(center)
        .inflate_px(radius_px, page)
        .intersects(bounds)
}

pub fn distance_point_to_segment(p: PixelPoint, a: PixelPoint, b: PixelPoint) -> f64 {
    distance_sq_point_to_segment(p, a, b).sqrt()
}

pub fn distance_sq_point_to_segment(p: PixelPoint, a: PixelPoint, b: PixelPoint) -> f64 {
    let vx = b.x - a.x;
    let vy = b.y - a.y;
    let wx = p.x - a.x;
    let wy = p.y - a.y;
    let len_sq = vx * vx + vy * vy;
    if len_sq <= f64::EPSILON {
        return wx * wx + wy * wy;
    }
    let t = ((wx * vx + wy * vy) / len_sq).clamp(0.0, 1.0);
    let dx = p.x - (a.x + vx * t);
    let dy = p.y - (a.y + vy * t);
    dx * dx + dy * dy
}

/// Perpendicular distance from `p` to the infinite line through `a` and `b`,
/// falling back to point distance when the chord is degenerate.
pub fn perpendicular_distance(p: PixelPoint, a: PixelPoint, b: PixelPoint) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    if dx == 0.0 && dy == 0.0 {
        return p.distance(a);
    }
    let numerator = (dy * p.x - dx * p.y + b.x * a.y - b.y * a.x).abs();
    numerator / dx.hypot(dy)
}
