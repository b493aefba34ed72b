use crate::ink::error::{InkError, InkResult};
use crate::ink::geometry::{distance_sq_point_to_segment, PixelPoint};
use anyhow::Context;
use std::path::Path;

/// Straight-alpha RGBA8 pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn filled(width: u32, height: u32, fill: [u8; 4]) -> Self {
        let mut buffer = Self::new(width, height);
        for px in buffer.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&fill);
        }
        buffer
    }

    pub fn is_drawable(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() == (self.width as usize) * (self.height as usize) * 4
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    pub fn non_transparent_pixels(&self) -> usize {
        self.pixels.chunks_exact(4).filter(|px| px[3] != 0).count()
    }

    /// Composites `src` over this buffer with its top-left corner at `(dx, dy)`.
    pub fn draw_over(&mut self, src: &RgbaBuffer, dx: i32, dy: i32) {
        let Some(rect) = PixelRect::new(dx, dy, src.width as i32, src.height as i32)
            .clamp(self.width, self.height)
        else {
            return;
        };
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                let src_idx = (((y - dy) as u32 * src.width + (x - dx) as u32) * 4) as usize;
                let s = &src.pixels[src_idx..src_idx + 4];
                if s[3] == 0 {
                    continue;
                }
                let alpha = f32::from(s[3]) / 255.0;
                let dst_idx = ((y as u32 * self.width + x as u32) * 4) as usize;
                blend_source_over(&mut self.pixels[dst_idx..dst_idx + 4], [s[0], s[1], s[2]], alpha);
            }
        }
    }

    pub fn to_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    pub fn save_png(&self, path: &Path) -> anyhow::Result<()> {
        let img = self
            .to_image()
            .ok_or_else(|| anyhow::anyhow!("raster buffer size does not match its pixel data"))?;
        img.save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("write png {}", path.display()))
    }
}

/// Integer pixel rectangle; half-open on the right and bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn intersect(self, other: PixelRect) -> Option<PixelRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect::new(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn clamp(self, width: u32, height: u32) -> Option<PixelRect> {
        self.intersect(PixelRect::new(0, 0, width as i32, height as i32))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeOp {
    SourceOver,
    /// Removes destination coverage where the source paints.
    DestinationOut,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub color: [u8; 4],
    pub alpha: f64,
    pub op: CompositeOp,
}

/// Drawing state over a raster target: a clip rectangle plus a translation,
/// so callers can draw page-space geometry into a tile-sized buffer.
#[derive(Debug)]
pub struct PaintContext<'a> {
    target: &'a mut RgbaBuffer,
    clip: PixelRect,
    origin: PixelPoint,
}

impl<'a> PaintContext<'a> {
    pub fn new(target: &'a mut RgbaBuffer) -> InkResult<Self> {
        if !target.is_drawable() {
            return Err(InkError::MissingCanvasTarget);
        }
        let clip = PixelRect::new(0, 0, target.width as i32, target.height as i32);
        Ok(Self {
            target,
            clip,
            origin: PixelPoint::new(0.0, 0.0),
        })
    }

    /// Page-space `origin` maps to target pixel (0, 0).
    pub fn with_origin(mut self, origin: PixelPoint) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_clip(mut self, clip: PixelRect) -> Self {
        self.clip = clip
            .intersect(self.clip)
            .unwrap_or(PixelRect::new(0, 0, 0, 0));
        self
    }

    pub fn target_size(&self) -> (u32, u32) {
        (self.target.width, self.target.height)
    }

    /// Strokes `path` as one round-capped, round-joined outline. Pixels covered
    /// by several segments of the same path are painted once.
    pub fn stroke_path(&mut self, path: &[PixelPoint], width: f64, paint: Paint) -> u64 {
        if path.is_empty() || self.clip.width <= 0 || self.clip.height <= 0 {
            return 0;
        }
        let local: Vec<PixelPoint> = path
            .iter()
            .map(|p| PixelPoint::new(p.x - self.origin.x, p.y - self.origin.y))
            .collect();
        let radius = (width * 0.5).max(0.5);

        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &local {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let pad = radius + 1.0;
        let x0 = (min_x - pad).floor() as i32;
        let y0 = (min_y - pad).floor() as i32;
        let x1 = (max_x + pad).ceil() as i32;
        let y1 = (max_y + pad).ceil() as i32;
        let Some(area) = PixelRect::new(x0, y0, x1 - x0, y1 - y0).intersect(self.clip) else {
            return 0;
        };

        let [r, g, b, a] = paint.color;
        let base_alpha = (paint.alpha * f64::from(a) / 255.0).clamp(0.0, 1.0) as f32;
        let reach_sq = (radius + 0.5) * (radius + 0.5);
        let mut writes = 0u64;

        for y in area.y..area.y + area.height {
            for x in area.x..area.x + area.width {
                let center = PixelPoint::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                let d_sq = min_distance_sq(center, &local);
                if d_sq >= reach_sq {
                    continue;
                }
                let coverage = (radius + 0.5 - d_sq.sqrt()).clamp(0.0, 1.0) as f32;
                let alpha = base_alpha * coverage;
                if alpha <= 0.0 {
                    continue;
                }
                let idx = ((y as u32 * self.target.width + x as u32) * 4) as usize;
                let px = &mut self.target.pixels[idx..idx + 4];
                match paint.op {
                    CompositeOp::SourceOver => blend_source_over(px, [r, g, b], alpha),
                    CompositeOp::DestinationOut => blend_destination_out(px, alpha),
                }
                writes += 1;
            }
        }
        writes
    }
}

fn min_distance_sq(p: PixelPoint, path: &[PixelPoint]) -> f64 {
    if path.len() == 1 {
        let dx = p.x - path[0].x;
        let dy = p.y - path[0].y;
        return dx * dx + dy * dy;
    }
    path.windows(2)
        .map(|seg| distance_sq_point_to_segment(p, seg[0], seg[1]))
        .fold(f64::INFINITY, f64::min)
}

fn blend_source_over(dst: &mut [u8], src: [u8; 3], src_a: f32) {
    let dst_a = f32::from(dst[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        dst.copy_from_slice(&[0, 0, 0, 0]);
        return;
    }
    for channel in 0..3 {
        let s = f32::from(src[channel]) * src_a;
        let d = f32::from(dst[channel]) * dst_a * (1.0 - src_a);
        dst[channel] = ((s + d) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

fn blend_destination_out(dst: &mut [u8], src_a: f32) {
    let remaining = f32::from(dst[3]) * (1.0 - src_a);
    dst[3] = remaining.round().clamp(0.0, 255.0) as u8;
    if dst[3] == 0 {
        dst[..3].fill(0);
    }
}

/// Flattens the quadratic curve `start -> control -> end` into a polyline.
pub fn flatten_quad(start: PixelPoint, control: PixelPoint, end: PixelPoint) -> Vec<PixelPoint> {
    let len = start.distance(control) + control.distance(end);
    let steps = ((len * 0.25).round() as usize).clamp(4, 256);
    let mut out = Vec::with_capacity(steps + 1);
    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        let mt = 1.0 - t;
        out.push(PixelPoint::new(
            mt * mt * start.x + 2.0 * mt * t * control.x + t * t * end.x,
            mt * mt * start.y + 2.0 * mt * t * control.y + t * t * end.y,
        ));
    }
    out
}
