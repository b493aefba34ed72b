use crate::ink::error::{InkError, InkResult};
use crate::ink::geometry::{Bounds, PageSize, PixelPoint};
use crate::ink::model::{StrokeId, StrokeRef, StrokeSet};
use crate::ink::raster::{PaintContext, PixelRect, RgbaBuffer};
use crate::ink::render::draw_stroke;
use slab::Slab;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Integer tile coordinate `(tile_x, tile_y)`.
pub type TileKey = (i32, i32);

#[derive(Debug)]
struct Tile {
    key: TileKey,
    raster: RgbaBuffer,
    dirty: bool,
}

#[derive(Debug, Clone)]
struct IndexedStroke {
    order: usize,
    stroke: StrokeRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileDrawStats {
    pub tiles_rendered: usize,
    pub tiles_blitted: usize,
    pub strokes_drawn: usize,
}

/// Spatial index from page tiles to the strokes whose bounds touch them, with
/// one cached raster per tile that is only re-rendered while dirty.
///
/// Tile rasters live in a pool and are recycled across rebuilds and resizes.
#[derive(Debug)]
pub struct TileCache {
    tile_size: u32,
    page: PageSize,
    stale: bool,
    tiles: Slab<Tile>,
    handles: HashMap<TileKey, usize>,
    spare: Vec<RgbaBuffer>,
    rasters_allocated: usize,
    index: HashMap<TileKey, HashSet<StrokeId>>,
    strokes: HashMap<StrokeId, IndexedStroke>,
}

impl TileCache {
    pub fn new(tile_size: u32, page: PageSize) -> Self {
        Self {
            tile_size: tile_size.max(1),
            page,
            stale: false,
            tiles: Slab::new(),
            handles: HashMap::new(),
            spare: Vec::new(),
            rasters_allocated: 0,
            index: HashMap::new(),
            strokes: HashMap::new(),
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn page_size(&self) -> PageSize {
        self.page
    }

    /// Changes the normalized-to-pixel mapping. Tile membership is stale
    /// until the next [`TileCache::rebuild`].
    pub fn update_page_size(&mut self, page: PageSize) {
        if page != self.page {
            self.page = page;
            self.stale = true;
        }
    }

    pub fn needs_rebuild(&self) -> bool {
        self.stale
    }

    /// Tiles covered by `bounds`, inclusive at both ends.
    pub fn tiles_for_bounds(&self, bounds: &Bounds) -> Vec<TileKey> {
        let px = self.page.bounds_to_pixels(bounds);
        let size = f64::from(self.tile_size);
        let start_x = (px.min_x / size).floor() as i32;
        let end_x = (px.max_x / size).floor() as i32;
        let start_y = (px.min_y / size).floor() as i32;
        let end_y = (px.max_y / size).floor() as i32;
        let mut keys = Vec::new();
        for y in start_y..=end_y {
            for x in start_x..=end_x {
                keys.push((x, y));
            }
        }
        keys
    }

    pub fn tile_rect(&self, key: TileKey) -> PixelRect {
        let size = self.tile_size as i32;
        PixelRect::new(key.0 * size, key.1 * size, size, size)
    }

    /// Drops every tile and index entry and re-derives them from `strokes`.
    pub fn rebuild(&mut self, strokes: &StrokeSet) {
        let handles: Vec<usize> = self.handles.drain().map(|(_, handle)| handle).collect();
        for handle in handles {
            self.release(handle);
        }
        self.index.clear();
        self.strokes.clear();
        self.stale = false;

        for (order, stroke) in strokes.iter().enumerate() {
            self.insert_stroke(order, stroke);
        }
        tracing::debug!(
            strokes = strokes.len(),
            tiles = self.handles.len(),
            "tile cache rebuilt"
        );
    }

    /// Updates the index for the strokes that differ by id between `before`
    /// and `after`. Only the removed and added strokes' tiles become dirty.
    pub fn apply_diff(&mut self, before: &StrokeSet, after: &StrokeSet) {
        let after_ids = after.id_set();
        let before_ids = before.id_set();
        let mut removed = 0usize;
        let mut added = 0usize;

        for stroke in before.iter() {
            if after_ids.contains(&stroke.id()) {
                continue;
            }
            removed += 1;
            self.strokes.remove(&stroke.id());
            for key in self.tiles_for_bounds(stroke.bounds()) {
                if let Some(ids) = self.index.get_mut(&key) {
                    ids.remove(&stroke.id());
                    if ids.is_empty() {
                        self.index.remove(&key);
                    }
                }
                self.mark_dirty(key);
            }
        }

        for (order, stroke) in after.iter().enumerate() {
            if before_ids.contains(&stroke.id()) {
                if let Some(entry) = self.strokes.get_mut(&stroke.id()) {
                    entry.order = order;
                }
                continue;
            }
            added += 1;
            self.insert_stroke(order, stroke);
        }
        tracing::debug!(removed, added, "tile cache diff applied");
    }

    /// Composites every tracked tile onto `target`, re-rendering only dirty
    /// tiles. Tiles left without strokes are returned to the pool afterwards.
    pub fn draw(&mut self, target: &mut RgbaBuffer) -> InkResult<TileDrawStats> {
        if !target.is_drawable() {
            return Err(InkError::MissingCanvasTarget);
        }
        if self.stale {
            tracing::warn!("drawing tile cache before rebuild after page resize");
        }
        target.clear();

        let mut stats = TileDrawStats::default();
        let mut keys: Vec<TileKey> = self.handles.keys().copied().collect();
        keys.sort_unstable();

        for key in &keys {
            let Some(&handle) = self.handles.get(key) else {
                continue;
            };
            if self.tiles[handle].dirty {
                stats.strokes_drawn += self.render_tile(handle)?;
                stats.tiles_rendered += 1;
            } else {
                stats.tiles_blitted += 1;
            }
            let rect = self.tile_rect(*key);
            target.draw_over(&self.tiles[handle].raster, rect.x, rect.y);
        }

        for key in keys {
            if self.index.contains_key(&key) {
                continue;
            }
            if let Some(handle) = self.handles.remove(&key) {
                self.release(handle);
            }
        }
        Ok(stats)
    }

    /// Tile membership as sorted sets, for inspection and comparison.
    pub fn membership(&self) -> BTreeMap<TileKey, BTreeSet<StrokeId>> {
        self.index
            .iter()
            .map(|(key, ids)| (*key, ids.iter().copied().collect()))
            .collect()
    }

    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    pub fn tracked_tiles(&self) -> usize {
        self.handles.len()
    }

    pub fn dirty_tiles(&self) -> Vec<TileKey> {
        let mut keys: Vec<TileKey> = self
            .handles
            .iter()
            .filter(|(_, handle)| self.tiles[**handle].dirty)
            .map(|(key, _)| *key)
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Number of tile rasters ever allocated; stays flat while the pool recycles.
    pub fn rasters_allocated(&self) -> usize {
        self.rasters_allocated
    }

    fn insert_stroke(&mut self, order: usize, stroke: &StrokeRef) {
        self.strokes.insert(
            stroke.id(),
            IndexedStroke {
                order,
                stroke: StrokeRef::clone(stroke),
            },
        );
        for key in self.tiles_for_bounds(stroke.bounds()) {
            self.index.entry(key).or_default().insert(stroke.id());
            self.mark_dirty(key);
        }
    }

    fn mark_dirty(&mut self, key: TileKey) {
        let handle = self.ensure_tile(key);
        self.tiles[handle].dirty = true;
    }

    fn ensure_tile(&mut self, key: TileKey) -> usize {
        if let Some(&handle) = self.handles.get(&key) {
            return handle;
        }
        let raster = match self.spare.pop() {
            Some(raster) if raster.width == self.tile_size => raster,
            _ => {
                self.rasters_allocated += 1;
                RgbaBuffer::new(self.tile_size, self.tile_size)
            }
        };
        let handle = self.tiles.insert(Tile {
            key,
            raster,
            dirty: true,
        });
        self.handles.insert(key, handle);
        handle
    }

    fn release(&mut self, handle: usize) {
        if self.tiles.contains(handle) {
            let tile = self.tiles.remove(handle);
            self.spare.push(tile.raster);
        }
    }

    fn render_tile(&mut self, handle: usize) -> InkResult<usize> {
        let key = self.tiles[handle].key;
        let rect = self.tile_rect(key);
        let mut members: Vec<&IndexedStroke> = self
            .index
            .get(&key)
            .map(|ids| ids.iter().filter_map(|id| self.strokes.get(id)).collect())
            .unwrap_or_default();
        members.sort_by_key(|entry| entry.order);

        let tile = &mut self.tiles[handle];
        tile.raster.clear();
        let mut ctx = PaintContext::new(&mut tile.raster)?
            .with_origin(PixelPoint::new(f64::from(rect.x), f64::from(rect.y)));
        for entry in &members {
            draw_stroke(&mut ctx, &entry.stroke, self.page);
        }
        tile.dirty = false;
        Ok(members.len())
    }
}
