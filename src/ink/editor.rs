use crate::ink::container::{self, Container, ImportReport};
use crate::ink::eraser::erase_strokes;
use crate::ink::error::{InkError, InkResult};
use crate::ink::geometry::PageSize;
use crate::ink::history::UndoLog;
use crate::ink::input::{DragInput, DragSession, PointerId};
use crate::ink::model::{
    now_millis, reserve_stroke_ids_through, Page, StrokeId, StrokeSet, StrokeStyle, Tool,
    MAX_PAGE_DIMENSION,
};
use crate::ink::normalize::{normalize_stroke, RawSample};
use crate::ink::perf::{FrameSnapshot, FrameStats};
use crate::ink::raster::{PaintContext, RgbaBuffer};
use crate::ink::render::{draw_live_segment, draw_points};
use crate::ink::settings::InkSettings;
use crate::ink::tiles::{TileCache, TileDrawStats};
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Stroke { stroke_id: StrokeId },
    Erased { removed: usize, created: usize },
    Unchanged,
}

#[derive(Debug)]
struct PageSlot {
    page: Page,
    tiles: TileCache,
    history: UndoLog,
}

impl PageSlot {
    fn new(page: Page, settings: &InkSettings) -> Self {
        let mut tiles = TileCache::new(settings.tile_size, page.size());
        tiles.rebuild(&page.strokes());
        Self {
            page,
            tiles,
            history: UndoLog::with_limit(settings.undo_limit),
        }
    }

    /// Canonical set first, then history, then tiles, then the timestamp.
    fn apply(&mut self, before: StrokeSet, after: StrokeSet, record: bool) {
        self.page.replace_strokes(after.clone());
        if record {
            self.history.push(before.clone(), after.clone());
        }
        self.tiles.apply_diff(&before, &after);
        self.page.touch(now_millis());
    }
}

/// Editing session over a notebook: pages, their tile caches and undo logs,
/// plus the one pointer drag that may be in flight.
#[derive(Debug)]
pub struct InkEditor {
    settings: InkSettings,
    pages: Vec<PageSlot>,
    active: usize,
    input: DragInput,
    style: StrokeStyle,
    read_only: bool,
    frame_stats: FrameStats,
}

impl InkEditor {
    pub fn new(mut settings: InkSettings) -> Self {
        settings.sanitize();
        let page = Page::new(1, settings.page_size(), settings.paper_style, now_millis());
        let slot = PageSlot::new(page, &settings);
        Self {
            style: settings.default_style(),
            settings,
            pages: vec![slot],
            active: 0,
            input: DragInput::new(),
            read_only: false,
            frame_stats: FrameStats::default(),
        }
    }

    pub fn settings(&self) -> &InkSettings {
        &self.settings
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Entering read-only drops any drag in progress without committing it.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
        if read_only && self.input.abandon().is_some() {
            tracing::debug!("active drag dropped for read-only mode");
        }
    }

    pub fn style(&self) -> StrokeStyle {
        self.style
    }

    /// Style for the next drag. A drag already in progress keeps its own.
    pub fn set_style(&mut self, style: StrokeStyle) {
        self.style = style;
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.style.tool = tool;
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter().map(|slot| &slot.page)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, page_id: u32) -> Option<&Page> {
        self.pages
            .iter()
            .find(|slot| slot.page.page_id == page_id)
            .map(|slot| &slot.page)
    }

    pub fn active_page(&self) -> &Page {
        &self.pages[self.active].page
    }

    pub fn active_page_id(&self) -> u32 {
        self.active_page().page_id
    }

    pub fn strokes(&self) -> StrokeSet {
        self.active_page().strokes()
    }

    pub fn tile_cache(&self) -> &TileCache {
        &self.pages[self.active].tiles
    }

    pub fn can_undo(&self) -> bool {
        self.pages[self.active].history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.pages[self.active].history.can_redo()
    }

    pub fn is_drawing(&self) -> bool {
        self.input.is_dragging()
    }

    pub fn frame_stats(&self) -> FrameSnapshot {
        self.frame_stats.snapshot()
    }

    pub fn set_active_page(&mut self, page_id: u32) -> InkResult<()> {
        let index = self.page_index(page_id)?;
        if index != self.active && self.input.abandon().is_some() {
            tracing::debug!(page_id, "active drag dropped on page switch");
        }
        self.active = index;
        Ok(())
    }

    /// Appends a page sized from settings and returns its id.
    pub fn add_page(&mut self) -> InkResult<u32> {
        self.ensure_writable()?;
        let page_id = self
            .pages
            .iter()
            .map(|slot| slot.page.page_id)
            .max()
            .unwrap_or(0)
            + 1;
        let page = Page::new(
            page_id,
            self.settings.page_size(),
            self.settings.paper_style,
            now_millis(),
        );
        self.pages.push(PageSlot::new(page, &self.settings));
        tracing::info!(page_id, "page added");
        Ok(page_id)
    }

    /// Starts a drag. Returns `false` when the event was ignored.
    pub fn pointer_down(&mut self, pointer_id: PointerId, sample: RawSample) -> bool {
        if self.read_only {
            return false;
        }
        let started = self.input.pointer_down(pointer_id, sample, self.style);
        if !started {
            tracing::debug!(pointer_id, "secondary pointer ignored during drag");
        }
        started
    }

    pub fn pointer_move(&mut self, pointer_id: PointerId, sample: RawSample) -> bool {
        if self.read_only {
            return false;
        }
        self.input.pointer_move(pointer_id, sample)
    }

    /// Ends the drag and commits it. `None` means the event was ignored.
    pub fn pointer_up(
        &mut self,
        pointer_id: PointerId,
        sample: RawSample,
    ) -> InkResult<Option<CommitOutcome>> {
        if self.read_only {
            return Ok(None);
        }
        match self.input.pointer_up(pointer_id, sample) {
            Some(session) => self.commit(session).map(Some),
            None => Ok(None),
        }
    }

    /// Cancelled drags commit whatever was captured.
    pub fn pointer_cancel(&mut self, pointer_id: PointerId) -> InkResult<Option<CommitOutcome>> {
        if self.read_only {
            return Ok(None);
        }
        match self.input.pointer_cancel(pointer_id) {
            Some(session) => self.commit(session).map(Some),
            None => Ok(None),
        }
    }

    fn commit(&mut self, session: DragSession) -> InkResult<CommitOutcome> {
        let eraser_mode = self.settings.eraser_mode;
        let eraser_radius = self.settings.eraser_radius_px;
        let style = session.style();
        let options = self.settings.normalize_options(style);
        let slot = &mut self.pages[self.active];
        let page_size = slot.page.size();
        let before = slot.page.strokes();

        let (after, outcome) = match style.tool {
            Tool::Eraser => {
                let path = session.points(page_size);
                let erased = erase_strokes(&before, &path, eraser_mode, eraser_radius, page_size);
                if !erased.changed {
                    tracing::debug!(points = path.len(), "eraser pass hit nothing");
                    return Ok(CommitOutcome::Unchanged);
                }
                let before_ids = before.id_set();
                let after_ids = erased.next_strokes.id_set();
                let removed = before_ids.difference(&after_ids).count();
                let created = after_ids.difference(&before_ids).count();
                tracing::info!(
                    page_id = slot.page.page_id,
                    strokes_before = before.len(),
                    strokes_after = erased.next_strokes.len(),
                    removed,
                    created,
                    "erase applied"
                );
                (erased.next_strokes, CommitOutcome::Erased { removed, created })
            }
            _ => {
                let stroke = normalize_stroke(session.samples(), page_size, &options)?;
                let stroke_id = stroke.id();
                tracing::debug!(
                    page_id = slot.page.page_id,
                    stroke_id = stroke_id.0,
                    samples = session.samples().len(),
                    points = stroke.points().len(),
                    "stroke committed"
                );
                (before.with_stroke(Arc::new(stroke)), CommitOutcome::Stroke { stroke_id })
            }
        };

        slot.apply(before, after, true);
        Ok(outcome)
    }

    /// Removes every stroke from the active page as one undoable edit.
    pub fn clear_page(&mut self) -> InkResult<bool> {
        self.ensure_writable()?;
        let slot = &mut self.pages[self.active];
        let before = slot.page.strokes();
        if before.is_empty() {
            return Ok(false);
        }
        tracing::info!(page_id = slot.page.page_id, strokes = before.len(), "page cleared");
        slot.apply(before, StrokeSet::empty(), true);
        Ok(true)
    }

    pub fn undo(&mut self) -> InkResult<bool> {
        self.ensure_writable()?;
        let slot = &mut self.pages[self.active];
        let Some(restored) = slot.history.undo() else {
            return Ok(false);
        };
        let current = slot.page.strokes();
        tracing::debug!(
            page_id = slot.page.page_id,
            from = current.len(),
            to = restored.len(),
            "undo"
        );
        slot.apply(current, restored, false);
        Ok(true)
    }

    pub fn redo(&mut self) -> InkResult<bool> {
        self.ensure_writable()?;
        let slot = &mut self.pages[self.active];
        let Some(restored) = slot.history.redo() else {
            return Ok(false);
        };
        let current = slot.page.strokes();
        tracing::debug!(
            page_id = slot.page.page_id,
            from = current.len(),
            to = restored.len(),
            "redo"
        );
        slot.apply(current, restored, false);
        Ok(true)
    }

    /// Changes the active page's pixel size and rebuilds its tiles. Stored
    /// points are normalized and do not move.
    pub fn resize_page(&mut self, width: u32, height: u32) -> InkResult<()> {
        self.ensure_writable()?;
        let size = PageSize::new(
            width.clamp(1, MAX_PAGE_DIMENSION),
            height.clamp(1, MAX_PAGE_DIMENSION),
        );
        let slot = &mut self.pages[self.active];
        slot.page.resize(size);
        slot.tiles.update_page_size(size);
        slot.tiles.rebuild(&slot.page.strokes());
        slot.page.touch(now_millis());
        tracing::info!(page_id = slot.page.page_id, width = size.width, height = size.height, "page resized");
        Ok(())
    }

    /// Composites the active page into `target`, then the in-progress drag.
    pub fn draw(&mut self, target: &mut RgbaBuffer) -> InkResult<TileDrawStats> {
        let started = Instant::now();
        let slot = &mut self.pages[self.active];
        if slot.tiles.needs_rebuild() {
            slot.tiles.rebuild(&slot.page.strokes());
        }
        let stats = slot.tiles.draw(target)?;
        if let Some(session) = self.input.active() {
            let page = slot.page.size();
            let mut ctx = PaintContext::new(target)?;
            draw_points(&mut ctx, &session.style(), &session.points(page), page);
        }
        self.frame_stats.record(started.elapsed(), stats);
        tracing::trace!(
            rendered = stats.tiles_rendered,
            blitted = stats.tiles_blitted,
            "frame drawn"
        );
        Ok(stats)
    }

    /// Paints only the newest piece of the active drag over an existing frame.
    pub fn draw_live_preview(&self, target: &mut RgbaBuffer) -> InkResult<u64> {
        let Some(session) = self.input.active() else {
            return Ok(0);
        };
        let page = self.active_page().size();
        let mut ctx = PaintContext::new(target)?;
        Ok(draw_live_segment(&mut ctx, &session.style(), &session.points(page), page))
    }

    pub fn export_container(&self) -> InkResult<Container> {
        let pages: Vec<Page> = self.pages().cloned().collect();
        container::export_pages(&pages, now_millis())
    }

    /// Replaces the whole document with the pages in `container`.
    ///
    /// Nothing changes unless at least one page decodes. On success all
    /// caches are rebuilt, history is cleared and future stroke ids are
    /// reserved above every imported id.
    pub fn import_container(&mut self, container: &Container) -> InkResult<ImportReport> {
        let report = container::import_pages(container)?;
        if report.pages.is_empty() {
            return Err(InkError::ContainerStructure {
                missing: "a decodable page record".to_string(),
            });
        }

        if let Some(max_id) = report.pages.iter().filter_map(Page::max_stroke_id).max() {
            reserve_stroke_ids_through(max_id);
        }
        let _ = self.input.abandon();
        self.pages = report
            .pages
            .iter()
            .cloned()
            .map(|page| PageSlot::new(page, &self.settings))
            .collect();
        self.active = 0;
        self.frame_stats.reset();
        Ok(report)
    }

    /// Exports into `<parent>/<slug>.ink/` and returns that folder.
    pub fn save_to_dir(&self, parent: &Path, document_id: &str) -> anyhow::Result<PathBuf> {
        let root = parent.join(container::container_dir_name(document_id));
        let archive = self.export_container().context("encode notebook container")?;
        archive.write_to_dir(&root)?;
        tracing::info!(path = %root.display(), pages = self.pages.len(), "notebook saved");
        Ok(root)
    }

    pub fn load_from_dir(&mut self, root: &Path) -> anyhow::Result<ImportReport> {
        let archive = Container::read_from_dir(root)?;
        self.import_container(&archive)
            .with_context(|| format!("import notebook container {}", root.display()))
    }

    fn page_index(&self, page_id: u32) -> InkResult<usize> {
        self.pages
            .iter()
            .position(|slot| slot.page.page_id == page_id)
            .ok_or(InkError::PageNotFound { page_id })
    }

    fn ensure_writable(&self) -> InkResult<()> {
        if self.read_only {
            return Err(InkError::ReadOnly);
        }
        Ok(())
    }
}

impl Default for InkEditor {
    fn default() -> Self {
        Self::new(InkSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f64, y: f64, t: f64) -> RawSample {
        RawSample::new(x, y, 0.5, t)
    }

    fn draw_line(editor: &mut InkEditor, y: f64) -> Option<CommitOutcome> {
        editor.pointer_down(1, sample(100.0, y, 0.0));
        editor.pointer_move(1, sample(200.0, y + 40.0, 16.0));
        editor.pointer_up(1, sample(300.0, y, 32.0)).unwrap()
    }

    #[test]
    fn commit_updates_set_history_tiles_and_timestamp() {
        let mut editor = InkEditor::default();
        let modified = editor.active_page().modified_timestamp;
        let outcome = draw_line(&mut editor, 100.0);
        assert!(matches!(outcome, Some(CommitOutcome::Stroke { .. })));
        assert_eq!(editor.strokes().len(), 1);
        assert!(editor.can_undo());
        assert!(!editor.tile_cache().membership().is_empty());
        assert!(editor.active_page().modified_timestamp > modified);
    }

    #[test]
    fn read_only_ignores_pointers_and_rejects_edits() {
        let mut editor = InkEditor::default();
        draw_line(&mut editor, 100.0);
        editor.set_read_only(true);
        assert!(!editor.pointer_down(1, sample(10.0, 10.0, 0.0)));
        assert_eq!(editor.pointer_up(1, sample(20.0, 20.0, 5.0)), Ok(None));
        assert_eq!(editor.undo(), Err(InkError::ReadOnly));
        assert_eq!(editor.clear_page(), Err(InkError::ReadOnly));
        assert_eq!(editor.strokes().len(), 1);
    }

    #[test]
    fn eraser_drag_that_misses_records_nothing() {
        let mut editor = InkEditor::default();
        draw_line(&mut editor, 100.0);
        editor.set_tool(Tool::Eraser);
        editor.pointer_down(1, sample(700.0, 900.0, 0.0));
        let outcome = editor.pointer_up(1, sample(710.0, 900.0, 16.0)).unwrap();
        assert_eq!(outcome, Some(CommitOutcome::Unchanged));
        assert_eq!(editor.strokes().len(), 1);
        editor.undo().unwrap();
        assert!(editor.strokes().is_empty());
    }

    #[test]
    fn unknown_page_is_reported() {
        let mut editor = InkEditor::default();
        assert_eq!(
            editor.set_active_page(9),
            Err(InkError::PageNotFound { page_id: 9 })
        );
        let id = editor.add_page().unwrap();
        editor.set_active_page(id).unwrap();
        assert_eq!(editor.active_page_id(), 2);
    }

    #[test]
    fn draw_overlays_drag_in_progress() {
        let mut editor = InkEditor::default();
        let mut frame = RgbaBuffer::new(800, 1000);
        editor.pointer_down(1, sample(100.0, 100.0, 0.0));
        editor.pointer_move(1, sample(300.0, 100.0, 16.0));
        let stats = editor.draw(&mut frame).unwrap();
        assert_eq!(stats.tiles_rendered, 0);
        assert!(frame.pixel(200, 100)[3] > 0);
        assert_eq!(editor.frame_stats().frame_samples, 1);
    }
}
