pub mod container;
pub mod editor;
pub mod eraser;
pub mod error;
pub mod geometry;
pub mod history;
pub mod input;
pub mod model;
pub mod normalize;
pub mod perf;
pub mod raster;
pub mod render;
pub mod settings;
pub mod settings_store;
pub mod tiles;
pub mod tool;

pub use container::{Container, ImportReport};
pub use editor::{CommitOutcome, InkEditor};
pub use eraser::{erase_strokes, EraseOutcome, EraserMode};
pub use error::{InkError, InkResult};
pub use geometry::{Bounds, PageSize, Point};
pub use history::UndoLog;
pub use model::{ColorRgba, Page, PaperStyle, Stroke, StrokeId, StrokeSet, StrokeStyle, Tool};
pub use normalize::{normalize_stroke, NormalizeOptions, RawSample};
pub use raster::RgbaBuffer;
pub use settings::InkSettings;
pub use tiles::{TileCache, TileDrawStats};
