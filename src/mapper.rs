use egui::Pos2;
use egui::Rect;
use egui::Vec2;

use crate::snapshot::WorldBounds;

/// Maps world cells onto the game area of the window.
///
/// Output is in game-area space with the world's y axis pointing up (row `minY` at y = 0). The
/// composed scene has to be mirrored vertically before it reaches the screen; see
/// [`CoordinateMapper::flip_y`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    bounds: WorldBounds,
    viewport: Vec2,
    columns: i64,
    rows: i64,
}

impl CoordinateMapper {
    /// An extent that does not fit in an `i64` maps as a single cell.
    pub fn new(bounds: WorldBounds, viewport: Vec2) -> Self {
        let columns = bounds.columns().unwrap_or(1).max(1);
        let rows = bounds.rows().unwrap_or(1).max(1);
        Self { bounds, viewport, columns, rows }
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn columns(&self) -> i64 {
        self.columns
    }

    pub fn rows(&self) -> i64 {
        self.rows
    }

    /// Whether a grid line per column fits, i.e. every cell is at least one pixel wide.
    pub fn columns_resolvable(&self) -> bool {
        self.columns as f64 <= self.viewport.x as f64
    }

    pub fn rows_resolvable(&self) -> bool {
        self.rows as f64 <= self.viewport.y as f64
    }

    /// Pixels per world cell: `viewport / (max - min + 1)` on each axis.
    pub fn scale(&self) -> Vec2 {
        Vec2::new(self.viewport.x / self.columns() as f32, self.viewport.y / self.rows() as f32)
    }

    /// Edge `cells` cells from the left. Computed as `extent * cells / n` so that the last edge is
    /// exactly the viewport width and neighbouring cells share an edge bit for bit.
    pub fn x_edge(&self, cells: f64) -> f32 {
        edge(self.viewport.x, cells, self.columns())
    }

    pub fn y_edge(&self, cells: f64) -> f32 {
        edge(self.viewport.y, cells, self.rows())
    }

    /// Pixel rectangle covering the world cell whose lower-left corner is `(x, y)`.
    pub fn cell_rect(&self, x: f64, y: f64) -> Rect {
        let dx = x - self.bounds.min_x as f64;
        let dy = y - self.bounds.min_y as f64;
        Rect::from_min_max(Pos2::new(self.x_edge(dx), self.y_edge(dy)), Pos2::new(self.x_edge(dx + 1.0), self.y_edge(dy + 1.0)))
    }

    /// Rectangle for raster cell `(row, column)`; the first raster row lands on the top world row.
    pub fn raster_rect(&self, row: usize, column: usize, row_count: usize) -> Rect {
        let from_bottom = row_count.saturating_sub(row + 1);
        Rect::from_min_max(
            Pos2::new(self.x_edge(column as f64), self.y_edge(from_bottom as f64)),
            Pos2::new(self.x_edge(column as f64 + 1.0), self.y_edge(from_bottom as f64 + 1.0)),
        )
    }

    /// Mirror a game-area y coordinate, as when flipping the finished offscreen scene.
    pub fn flip_y(&self, y: f32) -> f32 {
        self.viewport.y - y
    }
}

fn edge(extent: f32, cells: f64, count: i64) -> f32 {
    (extent as f64 * cells / count as f64) as f32
}
