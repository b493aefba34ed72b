use crate::ink::geometry::{Bounds, PageSize, Point};
use crate::ink::tool::{MAX_PRESSURE, MIN_PRESSURE};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tool {
    Pen,
    Highlighter,
    Eraser,
    Marker,
}

impl From<Tool> for u8 {
    fn from(tool: Tool) -> Self {
        match tool {
            Tool::Pen => 0,
            Tool::Highlighter => 1,
            Tool::Eraser => 2,
            Tool::Marker => 3,
        }
    }
}

impl TryFrom<u8> for Tool {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Tool::Pen),
            1 => Ok(Tool::Highlighter),
            2 => Ok(Tool::Eraser),
            3 => Ok(Tool::Marker),
            other => Err(format!("unknown tool kind {other}")),
        }
    }
}

/// Packed `0xRRGGBBAA` color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorRgba(pub u32);

impl ColorRgba {
    pub const BLACK: Self = Self::rgba(0, 0, 0, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(((r as u32) << 24) | ((g as u32) << 16) | ((b as u32) << 8) | a as u32)
    }

    pub const fn to_rgba_array(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    pub const fn from_rgba_array(color: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(color))
    }
}

impl Default for ColorRgba {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Globally unique stroke identity. Larger ids were created later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct StrokeId(pub u64);

impl<'de> Deserialize<'de> for StrokeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_u64_wire(deserializer).map(StrokeId)
    }
}

static NEXT_STROKE_ID: AtomicU64 = AtomicU64::new(1);

/// Hands out the next process-wide stroke id.
pub fn next_stroke_id() -> StrokeId {
    StrokeId(NEXT_STROKE_ID.fetch_add(1, Ordering::Relaxed))
}

/// Ensures every id handed out from now on is greater than `id`. Called for
/// ids that enter the process from outside, such as imported documents.
pub fn reserve_stroke_ids_through(id: StrokeId) {
    NEXT_STROKE_ID.fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum U64Wire {
    Number(u64),
    Text(String),
}

/// Accepts 64-bit values written either as JSON numbers or as decimal strings.
fn deserialize_u64_wire<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match U64Wire::deserialize(deserializer)? {
        U64Wire::Number(value) => Ok(value),
        U64Wire::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserialize_u64_wire(deserializer)?;
    i64::try_from(value).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub tool: Tool,
    pub color: ColorRgba,
    pub base_width: f64,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            tool: Tool::Pen,
            color: ColorRgba::BLACK,
            base_width: 2.0,
        }
    }
}

/// A committed, immutable stroke. `bounds` is always the tight box of `points`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    stroke_id: StrokeId,
    tool: Tool,
    #[serde(rename = "colorRGBA")]
    color: ColorRgba,
    base_width: f64,
    bounds: Bounds,
    points: Vec<Point>,
}

impl Stroke {
    /// Builds a stroke with a freshly allocated id and recomputed bounds.
    pub fn new(style: StrokeStyle, points: Vec<Point>) -> Self {
        Self::with_id(next_stroke_id(), style, points)
    }

    pub fn with_id(stroke_id: StrokeId, style: StrokeStyle, points: Vec<Point>) -> Self {
        Self {
            stroke_id,
            tool: style.tool,
            color: style.color,
            base_width: style.base_width,
            bounds: Bounds::from_points(&points),
            points,
        }
    }

    /// Replacement stroke carrying this stroke's style over a new point run.
    pub fn fragment(&self, points: Vec<Point>) -> Self {
        Self::new(self.style(), points)
    }

    pub fn id(&self) -> StrokeId {
        self.stroke_id
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn color(&self) -> ColorRgba {
        self.color
    }

    pub fn base_width(&self) -> f64 {
        self.base_width
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn style(&self) -> StrokeStyle {
        StrokeStyle {
            tool: self.tool,
            color: self.color,
            base_width: self.base_width,
        }
    }

    /// Checks the point and width ranges a decoded stroke must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        let id = self.stroke_id.0;
        if !(self.base_width.is_finite() && self.base_width > 0.0) {
            return Err(format!("stroke {id}: base width {} is not positive", self.base_width));
        }
        let unit = 0.0..=1.0;
        for (index, point) in self.points.iter().enumerate() {
            if !unit.contains(&point.x) || !unit.contains(&point.y) {
                return Err(format!(
                    "stroke {id} point {index}: ({}, {}) lies outside the page",
                    point.x, point.y
                ));
            }
            if !(MIN_PRESSURE..=MAX_PRESSURE).contains(&point.pressure) {
                return Err(format!(
                    "stroke {id} point {index}: pressure {} out of range",
                    point.pressure
                ));
            }
            if !(point.dt.is_finite() && point.dt >= 0.0) {
                return Err(format!("stroke {id} point {index}: negative dt {}", point.dt));
            }
        }
        Ok(())
    }

    /// Re-derives bounds, for strokes decoded from untrusted records.
    fn with_tight_bounds(mut self) -> Self {
        self.bounds = Bounds::from_points(&self.points);
        self
    }
}

pub type StrokeRef = Arc<Stroke>;

/// Immutable snapshot of a layer's strokes. Cloning shares the underlying
/// array, so snapshots are cheap to hand to the undo log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<Stroke>", into = "Vec<Stroke>")]
pub struct StrokeSet {
    strokes: Arc<[StrokeRef]>,
}

impl StrokeSet {
    pub fn new(strokes: Vec<StrokeRef>) -> Self {
        Self {
            strokes: strokes.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StrokeRef> {
        self.strokes.iter()
    }

    pub fn as_slice(&self) -> &[StrokeRef] {
        &self.strokes
    }

    pub fn get(&self, id: StrokeId) -> Option<&StrokeRef> {
        self.strokes.iter().find(|stroke| stroke.id() == id)
    }

    pub fn ids(&self) -> Vec<StrokeId> {
        self.strokes.iter().map(|stroke| stroke.id()).collect()
    }

    pub fn id_set(&self) -> HashSet<StrokeId> {
        self.strokes.iter().map(|stroke| stroke.id()).collect()
    }

    pub fn max_id(&self) -> Option<StrokeId> {
        self.strokes.iter().map(|stroke| stroke.id()).max()
    }

    /// New snapshot with `stroke` appended.
    pub fn with_stroke(&self, stroke: StrokeRef) -> Self {
        let mut strokes = self.strokes.to_vec();
        strokes.push(stroke);
        Self::new(strokes)
    }

    /// Whether both snapshots share the same backing array.
    pub fn ptr_eq(&self, other: &StrokeSet) -> bool {
        Arc::ptr_eq(&self.strokes, &other.strokes)
    }

    /// Same ids in the same order with equal content.
    pub fn same_content(&self, other: &StrokeSet) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b) || a == b)
    }
}

impl Default for StrokeSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<Stroke>> for StrokeSet {
    fn from(strokes: Vec<Stroke>) -> Self {
        Self::new(
            strokes
                .into_iter()
                .map(|stroke| Arc::new(stroke.with_tight_bounds()))
                .collect(),
        )
    }
}

impl From<StrokeSet> for Vec<Stroke> {
    fn from(set: StrokeSet) -> Self {
        set.iter().map(|stroke| stroke.as_ref().clone()).collect()
    }
}

impl FromIterator<StrokeRef> for StrokeSet {
    fn from_iter<I: IntoIterator<Item = StrokeRef>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperStyle {
    #[default]
    Blank,
    Lined,
    Grid,
    Dots,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub layer_id: u32,
    #[serde(default)]
    pub name: String,
    pub strokes: StrokeSet,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Layer {
    pub fn new(layer_id: u32, name: impl Into<String>) -> Self {
        Self {
            layer_id,
            name: name.into(),
            strokes: StrokeSet::empty(),
            visible: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page_id: u32,
    pub width: u32,
    pub height: u32,
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub paper_style: PaperStyle,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_timestamp: i64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub modified_timestamp: i64,
}

/// Largest page edge, in pixels, accepted from a decoded record.
pub const MAX_PAGE_DIMENSION: u32 = 32_768;

impl Page {
    pub fn new(page_id: u32, size: PageSize, paper_style: PaperStyle, now_ms: i64) -> Self {
        Self {
            page_id,
            width: size.width,
            height: size.height,
            layers: vec![Layer::new(0, "Layer 1")],
            paper_style,
            created_timestamp: now_ms,
            modified_timestamp: now_ms,
        }
    }

    pub fn size(&self) -> PageSize {
        PageSize::new(self.width, self.height)
    }

    /// Strokes of the active (first) layer.
    pub fn strokes(&self) -> StrokeSet {
        self.layers
            .first()
            .map(|layer| layer.strokes.clone())
            .unwrap_or_default()
    }

    /// Replaces the active layer's strokes and advances `modified_timestamp`.
    pub fn set_strokes(&mut self, strokes: StrokeSet, now_ms: i64) {
        self.replace_strokes(strokes);
        self.touch(now_ms);
    }

    /// Replaces the active layer's strokes without touching timestamps.
    pub fn replace_strokes(&mut self, strokes: StrokeSet) {
        match self.layers.first_mut() {
            Some(layer) => layer.strokes = strokes,
            None => {
                let mut layer = Layer::new(0, "Layer 1");
                layer.strokes = strokes;
                self.layers.push(layer);
            }
        }
    }

    pub fn resize(&mut self, size: PageSize) {
        self.width = size.width;
        self.height = size.height;
    }

    /// Moves `modified_timestamp` forward, strictly, even within one millisecond.
    pub fn touch(&mut self, now_ms: i64) {
        self.modified_timestamp = now_ms.max(self.modified_timestamp.saturating_add(1));
    }

    pub fn stroke_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.strokes.len()).sum()
    }

    /// Rejects records that would break the page model: a zero or oversized
    /// pixel size, out-of-range points, or a stroke id used twice.
    pub fn validate(&self) -> Result<(), String> {
        let valid_edge = 1..=MAX_PAGE_DIMENSION;
        if !valid_edge.contains(&self.width) || !valid_edge.contains(&self.height) {
            return Err(format!(
                "page {}: size {}x{} out of range",
                self.page_id, self.width, self.height
            ));
        }
        let mut ids = HashSet::new();
        for stroke in self.layers.iter().flat_map(|layer| layer.strokes.iter()) {
            if !ids.insert(stroke.id()) {
                return Err(format!(
                    "page {}: stroke id {} appears twice",
                    self.page_id,
                    stroke.id().0
                ));
            }
            stroke.validate()?;
        }
        Ok(())
    }

    pub fn stroke_ids(&self) -> impl Iterator<Item = StrokeId> + '_ {
        self.layers
            .iter()
            .flat_map(|layer| layer.strokes.iter().map(|stroke| stroke.id()))
    }

    pub fn max_stroke_id(&self) -> Option<StrokeId> {
        self.layers
            .iter()
            .filter_map(|layer| layer.strokes.max_id())
            .max()
    }
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
