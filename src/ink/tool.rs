use crate::ink::geometry::{PageSize, Point};
use crate::ink::model::Tool;

/// Per-tool width and alpha shaping used by the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolParams {
    pub tool_factor: f64,
    pub pressure_gamma: f64,
    pub velocity_k: f64,
    pub use_pressure_for_width: bool,
    pub use_velocity: bool,
}

const PEN: ToolParams = ToolParams {
    tool_factor: 1.0,
    pressure_gamma: 0.6,
    velocity_k: 0.003,
    use_pressure_for_width: true,
    use_velocity: true,
};

const HIGHLIGHTER: ToolParams = ToolParams {
    tool_factor: 1.0,
    pressure_gamma: 0.6,
    velocity_k: 0.0,
    use_pressure_for_width: false,
    use_velocity: false,
};

const MARKER: ToolParams = ToolParams {
    tool_factor: 0.8,
    pressure_gamma: 0.85,
    velocity_k: 0.006,
    use_pressure_for_width: true,
    use_velocity: true,
};

impl Tool {
    /// The eraser shapes its live preview like a pen.
    pub const fn params(self) -> ToolParams {
        match self {
            Tool::Pen | Tool::Eraser => PEN,
            Tool::Highlighter => HIGHLIGHTER,
            Tool::Marker => MARKER,
        }
    }
}

pub const MIN_PRESSURE: f64 = 0.1;
pub const MAX_PRESSURE: f64 = 1.0;

/// Maps raw device pressure into `[0.1, 1.0]`. Devices without pressure
/// (mice) report 0 and are treated as full pressure.
pub fn normalize_pressure(raw: f64) -> f64 {
    if raw == 0.0 || raw.is_nan() {
        return MAX_PRESSURE;
    }
    raw.clamp(MIN_PRESSURE, MAX_PRESSURE)
}

/// Two-sample exponential smoothing.
pub fn smooth_pressure(prev: f64, curr: f64) -> f64 {
    prev * 0.7 + curr * 0.3
}

pub fn pressure_curve(pressure: f64, gamma: f64) -> f64 {
    pressure.powf(gamma)
}

/// Pixels per millisecond between two consecutive points.
pub fn velocity(prev: &Point, curr: &Point, page: PageSize) -> f64 {
    let a = page.to_pixels(prev);
    let b = page.to_pixels(curr);
    a.distance(b) / curr.dt.max(1.0)
}
