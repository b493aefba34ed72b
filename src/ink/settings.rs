use crate::ink::eraser::EraserMode;
use crate::ink::geometry::PageSize;
use crate::ink::model::{ColorRgba, PaperStyle, StrokeStyle, Tool, MAX_PAGE_DIMENSION};
use crate::ink::normalize::NormalizeOptions;
use crate::ink::tiles::DEFAULT_TILE_SIZE;
use serde::{Deserialize, Serialize};

pub const MIN_TILE_SIZE: u32 = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InkSettings {
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    #[serde(default = "default_simplify")]
    pub simplify: bool,
    #[serde(default = "default_simplify_epsilon")]
    pub simplify_epsilon: f64,
    #[serde(default = "default_eraser_radius_px")]
    pub eraser_radius_px: f64,
    #[serde(default)]
    pub eraser_mode: EraserMode,
    #[serde(default = "default_tool")]
    pub default_tool: Tool,
    #[serde(default)]
    pub default_color: ColorRgba,
    #[serde(default = "default_width")]
    pub default_width: f64,
    #[serde(default = "default_page_width")]
    pub page_width: u32,
    #[serde(default = "default_page_height")]
    pub page_height: u32,
    #[serde(default)]
    pub paper_style: PaperStyle,
    #[serde(default)]
    pub undo_limit: Option<usize>,
    #[serde(default)]
    pub debug_logging: bool,
}

impl Default for InkSettings {
    fn default() -> Self {
        Self {
            tile_size: default_tile_size(),
            simplify: default_simplify(),
            simplify_epsilon: default_simplify_epsilon(),
            eraser_radius_px: default_eraser_radius_px(),
            eraser_mode: EraserMode::default(),
            default_tool: default_tool(),
            default_color: ColorRgba::default(),
            default_width: default_width(),
            page_width: default_page_width(),
            page_height: default_page_height(),
            paper_style: PaperStyle::default(),
            undo_limit: None,
            debug_logging: false,
        }
    }
}

impl InkSettings {
    /// Pulls out-of-range values back to something the engine can use.
    pub fn sanitize(&mut self) {
        self.tile_size = self.tile_size.max(MIN_TILE_SIZE);
        if !self.simplify_epsilon.is_finite() || self.simplify_epsilon < 0.0 {
            self.simplify_epsilon = 0.0;
        }
        if !self.eraser_radius_px.is_finite() || self.eraser_radius_px <= 0.0 {
            self.eraser_radius_px = default_eraser_radius_px();
        }
        if !self.default_width.is_finite() || self.default_width <= 0.0 {
            self.default_width = default_width();
        }
        self.page_width = self.page_width.clamp(1, MAX_PAGE_DIMENSION);
        self.page_height = self.page_height.clamp(1, MAX_PAGE_DIMENSION);
    }

    pub fn page_size(&self) -> PageSize {
        PageSize::new(self.page_width, self.page_height)
    }

    pub fn default_style(&self) -> StrokeStyle {
        StrokeStyle {
            tool: self.default_tool,
            color: self.default_color,
            base_width: self.default_width,
        }
    }

    pub fn normalize_options(&self, style: StrokeStyle) -> NormalizeOptions {
        NormalizeOptions {
            style,
            simplify: self.simplify,
            epsilon: self.simplify_epsilon,
        }
    }
}

fn default_tile_size() -> u32 {
    DEFAULT_TILE_SIZE
}

fn default_simplify() -> bool {
    true
}

fn default_simplify_epsilon() -> f64 {
    0.5
}

fn default_eraser_radius_px() -> f64 {
    10.0
}

fn default_tool() -> Tool {
    Tool::Pen
}

fn default_width() -> f64 {
    2.0
}

fn default_page_width() -> u32 {
    800
}

fn default_page_height() -> u32 {
    1000
}
