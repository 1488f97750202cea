use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use parking_lot::RwLockReadGuard;
use parking_lot::RwLockWriteGuard;
use serde::Deserialize;
use serde::Serialize;
use tracing::trace;
use tracing::warn;

use crate::message::SnapshotMessage;
use crate::raster::RasterGrid;

/// Small integer classifying an entity list (hazard area, directional marker, obstruction, agent type).
pub type CategoryKey = i64;

/// A point in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub x: f64,
    pub y: f64,
}

/// Inclusive world extent in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldBounds {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl WorldBounds {
    pub fn has_positive_width(&self) -> bool {
        self.max_x > self.min_x
    }

    /// Number of cells along x, `maxX - minX + 1`, or `None` if that overflows.
    pub fn columns(&self) -> Option<i64> {
        self.max_x.checked_sub(self.min_x)?.checked_add(1)
    }

    /// Number of cells along y, `maxY - minY + 1`, or `None` if that overflows.
    pub fn rows(&self) -> Option<i64> {
        self.max_y.checked_sub(self.min_y)?.checked_add(1)
    }

    /// Positive width and an extent that fits in an `i64` on both axes.
    pub fn is_usable(&self) -> bool {
        self.has_positive_width() && self.columns().is_some() && self.rows().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    pub current: i64,
    pub max: i64,
}

impl TickInfo {
    /// `current / max`, or `None` while `max` is zero.
    pub fn progress(&self) -> Option<f32> {
        if self.max == 0 {
            return None;
        }

        Some(self.current as f32 / self.max as f32)
    }
}

/// The latest view of the simulation, possibly assembled from several per-category messages.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub ticks: TickInfo,
    /// False until the first commit completes.
    pub ready: bool,
    pub world_bounds: WorldBounds,
    pub entities: BTreeMap<CategoryKey, Vec<Entity>>,
    pub raster: Option<Arc<RasterGrid>>,
}

impl Snapshot {
    pub fn new(world_bounds: WorldBounds, max_ticks: i64) -> Self {
        Self {
            ticks: TickInfo { current: 0, max: max_ticks },
            ready: false,
            world_bounds,
            entities: BTreeMap::new(),
            raster: None,
        }
    }

    /// Apply one message field by field. Only the message's category is overwritten; other
    /// categories keep whatever an earlier message left there.
    fn apply(&mut self, message: &SnapshotMessage, raster: Option<Arc<RasterGrid>>) {
        if let Some(current) = message.current_tick {
            self.ticks.current = current;
        }
        if let Some(max) = message.max_ticks {
            self.ticks.max = max;
        }

        if let Some(entities) = &message.entities {
            match message.category {
                Some(category) => {
                    self.entities.insert(category, entities.clone());
                }
                None => warn!("Ignoring {} entities without a category key", entities.len()),
            }
        }

        if let Some(bounds) = message.world_size {
            if bounds.is_usable() {
                self.world_bounds = bounds;
            } else {
                trace!(?bounds, "Ignoring world bounds without a usable positive width");
            }
        }

        // Replaced wholesale on every commit so rows never accumulate.
        self.raster = raster;
        self.ready = true;
    }
}

/// Reader/writer shared snapshot. The ingestion loop is the only writer; the render loop the only reader.
///
/// Guards are scoped: dropping one releases the lock exactly once, and `parking_lot` locks are not
/// poisoned, so a writer that unwinds mid-commit still leaves the store readable.
pub struct SnapshotStore {
    inner: RwLock<Snapshot>,
}

impl SnapshotStore {
    pub fn new(world_bounds: WorldBounds, max_ticks: i64) -> Self {
        Self { inner: RwLock::new(Snapshot::new(world_bounds, max_ticks)) }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.inner.read()
    }

    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, Snapshot>> {
        self.inner.try_read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.inner.write()
    }

    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, Snapshot>> {
        self.inner.try_write()
    }

    /// Commit a parsed message under exclusive access.
    pub fn commit(&self, message: &SnapshotMessage, raster: Option<Arc<RasterGrid>>) {
        let mut snapshot = self.write();
        snapshot.apply(message, raster);
        trace!(tick = snapshot.ticks.current, categories = snapshot.entities.len(), "Committed snapshot");
    }

    /// Drop every category's entities. `ready` and the rest of the snapshot are left as they were.
    pub fn clear_entities(&self) {
        self.write().entities.clear();
    }
}
