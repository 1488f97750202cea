use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use notify::EventKind;
use notify::RecommendedWatcher;
use notify::RecursiveMode;
use notify::Watcher;
use notify::event::ModifyKind;
use notify::event::RenameMode;
use parking_lot::RwLock;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::VizError;

/// Cell value marking an occupied (hazard) raster cell.
pub const OCCUPIED_CELL: &str = "1";

/// Floor-plan raster: rows of cell values, first row first as it appears in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RasterGrid {
    rows: Vec<Vec<String>>,
}

impl RasterGrid {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Parse semicolon separated rows. Rows may differ in length.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, VizError> {
        let mut reader = csv::ReaderBuilder::new().delimiter(b';').has_headers(false).flexible(true).from_reader(reader);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { rows })
    }

    pub fn load(path: &Path) -> Result<Self, VizError> {
        if !path.is_file() {
            return Err(VizError::RasterUnavailable(path.to_path_buf()));
        }

        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_occupied(value: &str) -> bool {
        value == OCCUPIED_CELL
    }
}

/// The current raster grid plus an optional file watcher that swaps in a freshly parsed grid
/// whenever the file changes.
pub struct RasterSource {
    current: Arc<RwLock<Option<Arc<RasterGrid>>>>,
    _watcher: Option<RecommendedWatcher>,
}

impl RasterSource {
    /// A source that never has a raster.
    pub fn empty() -> Self {
        Self { current: Arc::new(RwLock::new(None)), _watcher: None }
    }

    pub fn fixed(grid: RasterGrid) -> Self {
        Self { current: Arc::new(RwLock::new(Some(Arc::new(grid)))), _watcher: None }
    }

    /// Load `path` once; when `watch` is set, keep reloading it on change. A missing file yields an
    /// empty source rather than an error since the raster is optional decoration.
    pub fn open(path: &Path, watch: bool) -> Self {
        let initial = match RasterGrid::load(path) {
            Ok(grid) => {
                info!("Loaded raster {:?} with {} rows", path, grid.rows().len());
                Some(Arc::new(grid))
            }
            Err(e) => {
                warn!("Raster not loaded: {}", e);
                None
            }
        };
        let current = Arc::new(RwLock::new(initial));

        let watcher = if watch {
            match watch_raster(path.to_path_buf(), Arc::clone(&current)) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    warn!("Could not watch raster {:?}: {}", path, e);
                    None
                }
            }
        } else {
            None
        };

        Self { current, _watcher: watcher }
    }

    pub fn current(&self) -> Option<Arc<RasterGrid>> {
        self.current.read().clone()
    }
}

fn watch_raster(path: PathBuf, current: Arc<RwLock<Option<Arc<RasterGrid>>>>) -> Result<RecommendedWatcher, VizError> {
    // Editors usually replace the file, so watch the directory and filter on the file name.
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path.file_name().map(|name| name.to_os_string());

    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| match res {
        Ok(event) => {
            let relevant = matches!(
                event.kind,
                EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) | EventKind::Create(_)
            );
            if !relevant || !event.paths.iter().any(|p| p.file_name().map(|n| n.to_os_string()) == file_name) {
                return;
            }

            match RasterGrid::load(&path) {
                Ok(grid) => {
                    debug!("Reloaded raster {:?} ({} rows)", path, grid.rows().len());
                    *current.write() = Some(Arc::new(grid));
                }
                Err(e) => warn!("Raster reload failed: {}", e),
            }
        }
        Err(e) => debug!("watch error: {:?}", e),
    })?;

    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
