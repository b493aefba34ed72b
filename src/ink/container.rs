//! Notebook container: a path-keyed archive of JSON records.
//!
//! Layout:
//!
//! ```text
//! manifest.pb
//! pages/page-0001.pb
//! indexes/page-index.pb
//! indexes/stroke-index.pb
//! thumbs/
//! ```
//!
//! The manifest and both indexes are regenerated from the pages on every
//! export; import only trusts the page records.

use crate::ink::error::{InkError, InkResult};
use crate::ink::geometry::Bounds;
use crate::ink::model::{deserialize_timestamp, Page, StrokeId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use walkdir::WalkDir;

pub const MANIFEST_PATH: &str = "manifest.pb";
pub const PAGES_DIR: &str = "pages";
pub const INDEXES_DIR: &str = "indexes";
pub const PAGE_INDEX_PATH: &str = "indexes/page-index.pb";
pub const STROKE_INDEX_PATH: &str = "indexes/stroke-index.pb";
pub const THUMBS_DIR: &str = "thumbs";
pub const CONTAINER_EXTENSION: &str = "ink";
pub const MANIFEST_VERSION: u32 = 1;

const PAGE_PREFIX: &str = "pages/page-";
const RECORD_SUFFIX: &str = ".pb";

pub fn page_path(page_id: u32) -> String {
    format!("{PAGE_PREFIX}{page_id:04}{RECORD_SUFFIX}")
}

/// Directory name for a document, derived from the host's opaque id.
pub fn container_dir_name(document_id: &str) -> String {
    let stem = slug::slugify(document_id);
    let stem = if stem.is_empty() { "notebook".to_string() } else { stem };
    format!("{stem}.{CONTAINER_EXTENSION}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: u32,
    pub created_by: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_timestamp: i64,
    pub page_count: usize,
    pub total_strokes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageIndexEntry {
    pub page_id: u32,
    pub title: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_timestamp: i64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub modified_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeIndexEntry {
    pub stroke_id: StrokeId,
    pub page_id: u32,
    pub bounds: Bounds,
}

/// In-memory archive. Directory entries are tracked separately so empty
/// folders such as `thumbs/` survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Container {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(path.into(), bytes);
    }

    pub fn insert_dir(&mut self, path: impl Into<String>) {
        self.dirs.insert(path.into());
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn page_paths(&self) -> impl Iterator<Item = &str> {
        self.paths()
            .filter(|path| path.starts_with(PAGE_PREFIX) && path.ends_with(RECORD_SUFFIX))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Writes every entry under `root`, creating folders as needed.
    pub fn write_to_dir(&self, root: &Path) -> Result<()> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("create container folder {}", root.display()))?;
        for dir in &self.dirs {
            let path = root.join(dir);
            std::fs::create_dir_all(&path)
                .with_context(|| format!("create container folder {}", path.display()))?;
        }
        for (name, bytes) in &self.files {
            let path = root.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create container folder {}", parent.display()))?;
            }
            std::fs::write(&path, bytes)
                .with_context(|| format!("write container record {}", path.display()))?;
        }
        Ok(())
    }

    pub fn read_from_dir(root: &Path) -> Result<Self> {
        let mut container = Self::new();
        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry =
                entry.with_context(|| format!("walk container folder {}", root.display()))?;
            let relative = entry
                .path()
                .strip_prefix(root)
                .with_context(|| format!("resolve {} inside container", entry.path().display()))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if entry.file_type().is_dir() {
                container.insert_dir(name);
            } else if entry.file_type().is_file() {
                let bytes = std::fs::read(entry.path())
                    .with_context(|| format!("read container record {}", entry.path().display()))?;
                container.insert(name, bytes);
            }
        }
        Ok(container)
    }
}

fn encode<T: Serialize + ?Sized>(path: &str, value: &T) -> InkResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|err| InkError::Serialization {
        path: path.to_string(),
        message: err.to_string(),
    })
}

fn decode<T: for<'de> Deserialize<'de>>(path: &str, bytes: &[u8]) -> InkResult<T> {
    serde_json::from_slice(bytes).map_err(|err| InkError::Deserialization {
        path: path.to_string(),
        message: err.to_string(),
    })
}

pub fn build_manifest(pages: &[Page], now_ms: i64) -> Manifest {
    Manifest {
        version: MANIFEST_VERSION,
        created_by: concat!("ink_notebook v", env!("CARGO_PKG_VERSION")).to_string(),
        created_timestamp: now_ms,
        page_count: pages.len(),
        total_strokes: pages.iter().map(Page::stroke_count).sum(),
    }
}

pub fn build_page_index(pages: &[Page]) -> Vec<PageIndexEntry> {
    pages
        .iter()
        .map(|page| PageIndexEntry {
            page_id: page.page_id,
            title: format!("Page {}", page.page_id),
            created_timestamp: page.created_timestamp,
            modified_timestamp: page.modified_timestamp,
        })
        .collect()
}

pub fn build_stroke_index(pages: &[Page]) -> Vec<StrokeIndexEntry> {
    pages
        .iter()
        .flat_map(|page| {
            page.layers.iter().flat_map(move |layer| {
                layer.strokes.iter().map(move |stroke| StrokeIndexEntry {
                    stroke_id: stroke.id(),
                    page_id: page.page_id,
                    bounds: *stroke.bounds(),
                })
            })
        })
        .collect()
}

/// Encodes `pages` with freshly derived manifest and indexes.
pub fn export_pages(pages: &[Page], now_ms: i64) -> InkResult<Container> {
    let mut container = Container::new();
    container.insert(MANIFEST_PATH, encode(MANIFEST_PATH, &build_manifest(pages, now_ms))?);
    container.insert_dir(PAGES_DIR);
    for page in pages {
        let path = page_path(page.page_id);
        let bytes = encode(&path, page)?;
        container.insert(path, bytes);
    }
    container.insert_dir(INDEXES_DIR);
    container.insert(PAGE_INDEX_PATH, encode(PAGE_INDEX_PATH, &build_page_index(pages))?);
    container.insert(
        STROKE_INDEX_PATH,
        encode(STROKE_INDEX_PATH, &build_stroke_index(pages))?,
    );
    container.insert_dir(THUMBS_DIR);

    tracing::debug!(
        pages = pages.len(),
        records = container.len(),
        "notebook container exported"
    );
    Ok(container)
}

/// Pages recovered from a container plus every record that had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub manifest: Option<Manifest>,
    pub pages: Vec<Page>,
    pub skipped: Vec<InkError>,
}

impl ImportReport {
    pub fn is_lossless(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Decodes every page record, sorted by page id.
///
/// A missing manifest or a container without page records is a structural
/// error. A malformed or invalid record, or one reusing a page or stroke id,
/// is skipped and listed in the report.
pub fn import_pages(container: &Container) -> InkResult<ImportReport> {
    let manifest_bytes = container
        .get(MANIFEST_PATH)
        .ok_or_else(|| InkError::ContainerStructure {
            missing: MANIFEST_PATH.to_string(),
        })?;
    let page_paths: Vec<&str> = container.page_paths().collect();
    if page_paths.is_empty() {
        return Err(InkError::ContainerStructure {
            missing: format!("{PAGE_PREFIX}NNNN{RECORD_SUFFIX}"),
        });
    }

    let mut report = ImportReport::default();
    match decode::<Manifest>(MANIFEST_PATH, manifest_bytes) {
        Ok(manifest) => report.manifest = Some(manifest),
        Err(err) => {
            tracing::warn!(error = %err, "skipping unreadable manifest");
            report.skipped.push(err);
        }
    }

    let mut page_ids = BTreeSet::new();
    let mut stroke_ids = HashSet::new();
    for path in page_paths {
        let Some(bytes) = container.get(path) else {
            continue;
        };
        let admitted = decode::<Page>(path, bytes)
            .and_then(|page| admit_page(path, page, &mut page_ids, &mut stroke_ids));
        match admitted {
            Ok(page) => report.pages.push(page),
            Err(err) => {
                tracing::warn!(error = %err, "skipping page record");
                report.skipped.push(err);
            }
        }
    }
    report.pages.sort_by_key(|page| page.page_id);

    tracing::info!(
        pages = report.pages.len(),
        skipped = report.skipped.len(),
        "notebook container imported"
    );
    Ok(report)
}

/// Accepts a decoded page only if it is internally valid and shares neither
/// its page id nor any stroke id with a page admitted earlier.
fn admit_page(
    path: &str,
    page: Page,
    page_ids: &mut BTreeSet<u32>,
    stroke_ids: &mut HashSet<StrokeId>,
) -> InkResult<Page> {
    let reject = |message: String| InkError::Deserialization {
        path: path.to_string(),
        message,
    };
    page.validate().map_err(reject)?;
    if page_ids.contains(&page.page_id) {
        return Err(reject(format!("duplicate page id {}", page.page_id)));
    }
    if let Some(id) = page.stroke_ids().find(|id| stroke_ids.contains(id)) {
        return Err(reject(format!("stroke id {} already used by another page", id.0)));
    }
    page_ids.insert(page.page_id);
    stroke_ids.extend(page.stroke_ids());
    Ok(page)
}

pub fn read_page_index(container: &Container) -> InkResult<Vec<PageIndexEntry>> {
    let bytes = container
        .get(PAGE_INDEX_PATH)
        .ok_or_else(|| InkError::ContainerStructure {
            missing: PAGE_INDEX_PATH.to_string(),
        })?;
    decode(PAGE_INDEX_PATH, bytes)
}

pub fn read_stroke_index(container: &Container) -> InkResult<Vec<StrokeIndexEntry>> {
    let bytes = container
        .get(STROKE_INDEX_PATH)
        .ok_or_else(|| InkError::ContainerStructure {
            missing: STROKE_INDEX_PATH.to_string(),
        })?;
    decode(STROKE_INDEX_PATH, bytes)
}

/// Ids of strokes on `page_id` whose bounds overlap `area`, without decoding pages.
pub fn strokes_in_area(index: &[StrokeIndexEntry], page_id: u32, area: &Bounds) -> Vec<StrokeId> {
    index
        .iter()
        .filter(|entry| entry.page_id == page_id && entry.bounds.intersects(area))
        .map(|entry| entry.stroke_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ink::geometry::{PageSize, Point};
    use crate::ink::model::{PaperStyle, Stroke, StrokeSet, StrokeStyle};
    use std::sync::Arc;

    fn page(page_id: u32, strokes: usize) -> Page {
        let mut page = Page::new(page_id, PageSize::new(800, 1000), PaperStyle::Lined, 1_000);
        let set: StrokeSet = (0..strokes)
            .map(|i| {
                let x = 0.1 + i as f64 * 0.1;
                Arc::new(Stroke::new(
                    StrokeStyle::default(),
                    vec![Point::new(x, 0.2, 0.5, 0.0), Point::new(x, 0.3, 0.5, 16.0)],
                ))
            })
            .collect();
        page.set_strokes(set, 2_000);
        page
    }

    #[test]
    fn page_paths_are_zero_padded() {
        assert_eq!(page_path(7), "pages/page-0007.pb");
        assert_eq!(page_path(12345), "pages/page-12345.pb");
    }

    #[test]
    fn export_writes_every_structural_piece() {
        let pages = vec![page(1, 2), page(2, 1)];
        let container = export_pages(&pages, 42).unwrap();
        assert!(container.contains(MANIFEST_PATH));
        assert!(container.contains("pages/page-0001.pb"));
        assert!(container.contains("pages/page-0002.pb"));
        assert!(container.contains(PAGE_INDEX_PATH));
        assert!(container.contains(STROKE_INDEX_PATH));
        assert!(container.has_dir(THUMBS_DIR));

        let manifest: Manifest = serde_json::from_slice(container.get(MANIFEST_PATH).unwrap()).unwrap();
        assert_eq!(manifest.version, 1);
        assert_eq!(manifest.page_count, 2);
        assert_eq!(manifest.total_strokes, 3);
        assert_eq!(manifest.created_timestamp, 42);

        let titles: Vec<String> = read_page_index(&container)
            .unwrap()
            .into_iter()
            .map(|entry| entry.title)
            .collect();
        assert_eq!(titles, vec!["Page 1", "Page 2"]);
        assert_eq!(read_stroke_index(&container).unwrap().len(), 3);
    }

    #[test]
    fn import_sorts_pages_by_id() {
        let container = export_pages(&[page(3, 1), page(1, 0), page(2, 2)], 0).unwrap();
        let report = import_pages(&container).unwrap();
        let ids: Vec<u32> = report.pages.iter().map(|p| p.page_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(report.is_lossless());
        let counts: Vec<usize> = report.pages.iter().map(Page::stroke_count).collect();
        assert_eq!(counts, vec![0, 2, 1]);
    }

    #[test]
    fn missing_manifest_is_structural() {
        let mut container = export_pages(&[page(1, 1)], 0).unwrap();
        container.remove(MANIFEST_PATH);
        assert_eq!(
            import_pages(&container).err(),
            Some(InkError::ContainerStructure {
                missing: MANIFEST_PATH.to_string()
            })
        );
    }

    #[test]
    fn container_without_pages_is_structural() {
        let mut container = export_pages(&[page(1, 1)], 0).unwrap();
        container.remove("pages/page-0001.pb");
        assert!(matches!(
            import_pages(&container),
            Err(InkError::ContainerStructure { .. })
        ));
    }

    #[test]
    fn malformed_page_is_skipped_and_reported() {
        let mut container = export_pages(&[page(1, 1), page(2, 1)], 0).unwrap();
        container.insert("pages/page-0002.pb", b"{\"pageId\":".to_vec());
        let report = import_pages(&container).unwrap();
        assert_eq!(report.pages.len(), 1);
        assert_eq!(report.pages[0].page_id, 1);
        assert!(matches!(
            &report.skipped[..],
            [InkError::Deserialization { path, .. }] if path == "pages/page-0002.pb"
        ));
    }

    const BAD_POINTS_PAGE: &str = r#"{"pageId":2,"width":800,"height":1000,
        "createdTimestamp":0,"modifiedTimestamp":0,
        "layers":[{"layerId":0,"strokes":[
          {"strokeId":900001,"tool":0,"colorRGBA":255,"baseWidth":2.0,
           "bounds":{"minX":0,"minY":0,"maxX":0,"maxY":0},
           "points":[{"x":0.0,"y":0.1,"pressure":0.5,"dt":0},
                     {"x":40.0,"y":0.1,"pressure":7.0,"dt":-50}]}]}]}"#;

    #[test]
    fn out_of_range_points_skip_the_page() {
        let mut container = export_pages(&[page(1, 1)], 0).unwrap();
        container.insert("pages/page-0002.pb", BAD_POINTS_PAGE.as_bytes().to_vec());
        let report = import_pages(&container).unwrap();
        assert!(!report.is_lossless());
        assert_eq!(report.pages.len(), 1);
        assert!(matches!(
            &report.skipped[..],
            [InkError::Deserialization { path, .. }] if path == "pages/page-0002.pb"
        ));
    }

    #[test]
    fn repeated_stroke_ids_skip_the_page() {
        let original = page(1, 1);
        let stroke_id = original.strokes().as_slice()[0].id().0;
        let mut container = export_pages(&[original], 0).unwrap();
        let json = String::from_utf8(container.get("pages/page-0001.pb").unwrap().to_vec()).unwrap();
        let twin = json.replace("\"pageId\":1", "\"pageId\":2");
        container.insert("pages/page-0002.pb", twin.into_bytes());

        let report = import_pages(&container).unwrap();
        let ids: Vec<u32> = report.pages.iter().map(|p| p.page_id).collect();
        assert_eq!(ids, vec![1]);
        assert!(matches!(
            &report.skipped[..],
            [InkError::Deserialization { message, .. }]
                if message.contains(&stroke_id.to_string())
        ));

        let mut doubled = page(3, 1);
        let strokes = doubled.strokes();
        let twin = Arc::clone(&strokes.as_slice()[0]);
        doubled.replace_strokes(strokes.with_stroke(twin));
        let container = export_pages(&[page(1, 1), doubled], 0).unwrap();
        let report = import_pages(&container).unwrap();
        assert_eq!(report.pages.len(), 1);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn oversized_page_is_skipped() {
        let mut huge = page(2, 1);
        huge.width = crate::ink::model::MAX_PAGE_DIMENSION * 2;
        let container = export_pages(&[page(1, 1), huge], 0).unwrap();
        let report = import_pages(&container).unwrap();
        assert_eq!(report.pages.len(), 1);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn legacy_string_ids_and_timestamps_decode() {
        let mut container = export_pages(&[page(1, 0)], 0).unwrap();
        let legacy = r#"{"pageId":1,"width":800,"height":1000,"paperStyle":"grid",
            "createdTimestamp":"1700000000000","modifiedTimestamp":"1700000000001",
            "layers":[{"layerId":0,"name":"Layer 1","visible":true,"strokes":[
              {"strokeId":"1700000000000123456","tool":1,"colorRGBA":4278190335,
               "baseWidth":12.0,"bounds":{"minX":0,"minY":0,"maxX":0,"maxY":0},
               "points":[{"x":0.1,"y":0.2,"pressure":0.5,"dt":0},
                         {"x":0.3,"y":0.4,"pressure":0.5,"dt":16}]}]}]}"#;
        container.insert("pages/page-0001.pb", legacy.as_bytes().to_vec());
        let report = import_pages(&container).unwrap();
        let page = &report.pages[0];
        assert_eq!(page.paper_style, PaperStyle::Grid);
        assert_eq!(page.modified_timestamp, 1_700_000_000_001);
        let strokes = page.strokes();
        let stroke = &strokes.as_slice()[0];
        assert_eq!(stroke.id(), StrokeId(1_700_000_000_000_123_456));
        assert_eq!(stroke.bounds().max_y, 0.4);
    }

    #[test]
    fn stroke_index_answers_area_queries() {
        let pages = vec![page(1, 3), page(2, 1)];
        let container = export_pages(&pages, 0).unwrap();
        let index = read_stroke_index(&container).unwrap();
        let area = Bounds {
            min_x: 0.15,
            min_y: 0.0,
            max_x: 0.35,
            max_y: 1.0,
        };
        let hits = strokes_in_area(&index, 1, &area);
        let expected: Vec<StrokeId> = pages[0].strokes().as_slice()[1..]
            .iter()
            .map(|s| s.id())
            .collect();
        assert_eq!(hits, expected);
    }

    #[test]
    fn dir_names_are_slugged() {
        assert_eq!(container_dir_name("My Notes / Week 1"), "my-notes-week-1.ink");
        assert_eq!(container_dir_name("???"), "notebook.ink");
    }
}
