use egui::Color32;
use egui::Pos2;
use egui::Rect;
use egui::Vec2;

use crate::mapper::CoordinateMapper;
use crate::raster::RasterGrid;
use crate::snapshot::CategoryKey;
use crate::snapshot::Entity;
use crate::snapshot::Snapshot;

// ─── Palette ─────────────────────────────────────────────────────────────────

pub const GRAY: Color32 = Color32::from_rgb(100, 100, 100);
pub const WHITE: Color32 = Color32::from_rgb(255, 255, 255);
pub const BLACK: Color32 = Color32::from_rgb(0, 0, 0);
pub const ORANGE: Color32 = Color32::from_rgb(255, 128, 0);
pub const GREEN: Color32 = Color32::from_rgb(0, 255, 0);
pub const YELLOW: Color32 = Color32::from_rgb(255, 255, 0);
pub const RED: Color32 = Color32::from_rgb(255, 0, 0);
pub const BLUE_LIGHT: Color32 = Color32::from_rgb(174, 218, 233);
pub const PROGRESS_GREEN: Color32 = Color32::from_rgb(0, 128, 0);

pub const SCENE_BACKGROUND: Color32 = BLACK;
pub const GRID_COLOR: Color32 = BLUE_LIGHT;
pub const OCCUPIED_RASTER_COLOR: Color32 = BLUE_LIGHT;
pub const AGENT_COLORS: [Color32; 3] = [GREEN, YELLOW, RED];

pub const HAZARD_AREA_CATEGORY: CategoryKey = 19;
pub const DIRECTIONAL_HAZARD_CATEGORY: CategoryKey = 20;
pub const OBSTRUCTION_CATEGORY: CategoryKey = 21;

const LINE_WIDTH: f32 = 1.0;
const AGENT_RADIUS: f32 = 7.0;
const AGENT_LABEL_SIZE: f32 = 10.0;

// ─── Draw commands ───────────────────────────────────────────────────────────

/// One primitive in game-area space, y axis up. Mirrored and offset onto the window when blitted.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillRect { rect: Rect, color: Color32 },
    Line { from: Pos2, to: Pos2, width: f32, color: Color32 },
    Circle { center: Pos2, radius: f32, color: Color32 },
    /// Upright text centered on `center`; only its anchor is mirrored.
    Label { center: Pos2, text: String, size: f32, color: Color32 },
}

impl DrawCommand {
    /// The same primitive after mirroring the scene vertically within `height`.
    pub fn flipped(&self, height: f32) -> DrawCommand {
        let flip = |p: Pos2| Pos2::new(p.x, height - p.y);
        match self {
            DrawCommand::FillRect { rect, color } => {
                DrawCommand::FillRect { rect: Rect::from_two_pos(flip(rect.min), flip(rect.max)), color: *color }
            }
            DrawCommand::Line { from, to, width, color } => {
                DrawCommand::Line { from: flip(*from), to: flip(*to), width: *width, color: *color }
            }
            DrawCommand::Circle { center, radius, color } => {
                DrawCommand::Circle { center: flip(*center), radius: *radius, color: *color }
            }
            DrawCommand::Label { center, text, size, color } => {
                DrawCommand::Label { center: flip(*center), text: text.clone(), size: *size, color: *color }
            }
        }
    }
}

/// How entities of a category are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    HazardArea,
    DirectionalHazard,
    Obstruction,
    Agent { color: Color32 },
}

impl Marker {
    pub fn for_category(category: CategoryKey) -> Self {
        match category {
            HAZARD_AREA_CATEGORY => Marker::HazardArea,
            DIRECTIONAL_HAZARD_CATEGORY => Marker::DirectionalHazard,
            OBSTRUCTION_CATEGORY => Marker::Obstruction,
            other => Marker::Agent { color: agent_color(other) },
        }
    }
}

pub fn agent_color(category: CategoryKey) -> Color32 {
    AGENT_COLORS[category.rem_euclid(AGENT_COLORS.len() as i64) as usize]
}

fn push_marker(commands: &mut Vec<DrawCommand>, category: CategoryKey, entity: &Entity, mapper: &CoordinateMapper) {
    let cell = mapper.cell_rect(entity.x, entity.y);

    match Marker::for_category(category) {
        Marker::HazardArea => commands.push(DrawCommand::FillRect { rect: cell, color: ORANGE }),
        Marker::DirectionalHazard => {
            commands.push(DrawCommand::Line { from: cell.left_bottom(), to: cell.right_top(), width: LINE_WIDTH, color: BLUE_LIGHT });
            commands.push(DrawCommand::Line {
                from: cell.right_bottom(),
                to: cell.left_top(),
                width: LINE_WIDTH,
                color: agent_color(category),
            });
        }
        Marker::Obstruction => commands.push(DrawCommand::FillRect { rect: cell, color: GRAY }),
        Marker::Agent { color } => {
            commands.push(DrawCommand::Circle { center: cell.center(), radius: AGENT_RADIUS, color });
            commands.push(DrawCommand::Label { center: cell.center(), text: category.to_string(), size: AGENT_LABEL_SIZE, color: BLACK });
        }
    }
}

/// Lines along an axis whose cells are narrower than a pixel would only fill the area, so they are left out.
fn push_grid(commands: &mut Vec<DrawCommand>, mapper: &CoordinateMapper) {
    let size = mapper.viewport();
    if mapper.columns_resolvable() {
        for column in 1..mapper.columns() {
            let x = mapper.x_edge(column as f64);
            commands.push(DrawCommand::Line { from: Pos2::new(x, 0.0), to: Pos2::new(x, size.y), width: LINE_WIDTH, color: GRID_COLOR });
        }
    }
    if mapper.rows_resolvable() {
        for row in 1..mapper.rows() {
            let y = mapper.y_edge(row as f64);
            commands.push(DrawCommand::Line { from: Pos2::new(0.0, y), to: Pos2::new(size.x, y), width: LINE_WIDTH, color: GRID_COLOR });
        }
    }
}

fn push_raster(commands: &mut Vec<DrawCommand>, raster: &RasterGrid, mapper: &CoordinateMapper) {
    let row_count = raster.rows().len();
    for (row_index, row) in raster.rows().iter().enumerate() {
        for (column_index, value) in row.iter().enumerate() {
            let color = if RasterGrid::is_occupied(value) { OCCUPIED_RASTER_COLOR } else { SCENE_BACKGROUND };
            commands.push(DrawCommand::FillRect { rect: mapper.raster_rect(row_index, column_index, row_count), color });
        }
    }
}

/// Draw the snapshot in order: background, grid, raster, then entities by ascending category.
pub fn compose(snapshot: &Snapshot, viewport: Vec2) -> Vec<DrawCommand> {
    let mapper = CoordinateMapper::new(snapshot.world_bounds, viewport);
    let mut commands = Vec::new();

    commands.push(DrawCommand::FillRect { rect: Rect::from_min_size(Pos2::ZERO, viewport), color: SCENE_BACKGROUND });
    push_grid(&mut commands, &mapper);

    if let Some(raster) = snapshot.raster.as_deref() {
        push_raster(&mut commands, raster, &mapper);
    }

    for (category, entities) in &snapshot.entities {
        for entity in entities {
            push_marker(&mut commands, *category, entity, &mapper);
        }
    }

    commands
}

// ─── Composed frame ──────────────────────────────────────────────────────────

/// HUD values captured together with the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HudInfo {
    pub tick: i64,
    pub progress: Option<f32>,
    pub measured_fps: f32,
    pub desired_fps: u32,
}

/// One finished frame, handed from the render thread to the UI thread.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    /// Game-area size the scene was composed for.
    pub viewport: Vec2,
    /// Already mirrored; ready to blit at the game-area origin.
    pub commands: Vec<DrawCommand>,
    pub hud: HudInfo,
    pub frame_index: u64,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::snapshot::TickInfo;
    use crate::snapshot::WorldBounds;

    fn snapshot(entities: &[(CategoryKey, Vec<Entity>)]) -> Snapshot {
        Snapshot {
            ticks: TickInfo { current: 1, max: 10 },
            ready: true,
            world_bounds: WorldBounds { min_x: 0, min_y: 0, max_x: 9, max_y: 9 },
            entities: entities.iter().cloned().collect::<BTreeMap<_, _>>(),
            raster: None,
        }
    }

    #[test]
    fn fixed_dispatch_table() {
        assert_eq!(Marker::for_category(19), Marker::HazardArea);
        assert_eq!(Marker::for_category(20), Marker::DirectionalHazard);
        assert_eq!(Marker::for_category(21), Marker::Obstruction);
        assert_eq!(Marker::for_category(0), Marker::Agent { color: GREEN });
        assert_eq!(Marker::for_category(1), Marker::Agent { color: YELLOW });
        assert_eq!(Marker::for_category(5), Marker::Agent { color: RED });
        assert_eq!(Marker::for_category(22), Marker::Agent { color: YELLOW });
        assert_eq!(Marker::for_category(-1), Marker::Agent { color: RED });
    }

    #[test]
    fn background_then_grid_first() {
        let commands = compose(&snapshot(&[]), Vec2::new(100.0, 100.0));
        assert_eq!(
            commands[0],
            DrawCommand::FillRect { rect: Rect::from_min_size(Pos2::ZERO, Vec2::new(100.0, 100.0)), color: SCENE_BACKGROUND }
        );
        // 9 inner vertical + 9 inner horizontal lines for a 10x10 world
        assert_eq!(commands.len(), 1 + 18);
        assert!(commands[1..].iter().all(|c| matches!(c, DrawCommand::Line { color, .. } if *color == GRID_COLOR)));
    }

    #[test]
    fn huge_world_draws_no_sub_pixel_grid() {
        let mut snapshot = snapshot(&[]);
        snapshot.world_bounds = WorldBounds { min_x: 0, min_y: 0, max_x: 1_000_000_000, max_y: 9 };

        let commands = compose(&snapshot, Vec2::new(100.0, 100.0));
        // background plus the 9 horizontal lines; no vertical lines
        assert_eq!(commands.len(), 1 + 9);
        assert!(commands[1..].iter().all(|c| matches!(c, DrawCommand::Line { from, to, .. } if from.y == to.y)));
    }

    #[test]
    fn hazard_area_fills_its_cell() {
        let commands = compose(&snapshot(&[(19, vec![Entity { x: 3.0, y: 4.0 }])]), Vec2::new(100.0, 100.0));
        let last = commands.last().unwrap();
        assert_eq!(
            *last,
            DrawCommand::FillRect { rect: Rect::from_min_max(Pos2::new(30.0, 40.0), Pos2::new(40.0, 50.0)), color: ORANGE }
        );
    }

    #[test]
    fn directional_hazard_is_a_cross() {
        let commands = compose(&snapshot(&[(20, vec![Entity { x: 0.0, y: 0.0 }])]), Vec2::new(100.0, 100.0));
        let cross = &commands[commands.len() - 2..];
        assert_eq!(
            cross[0],
            DrawCommand::Line { from: Pos2::new(0.0, 10.0), to: Pos2::new(10.0, 0.0), width: LINE_WIDTH, color: BLUE_LIGHT }
        );
        assert_eq!(
            cross[1],
            DrawCommand::Line { from: Pos2::new(10.0, 10.0), to: Pos2::new(0.0, 0.0), width: LINE_WIDTH, color: RED }
        );
    }

    #[test]
    fn agent_is_labelled_circle() {
        let commands = compose(&snapshot(&[(4, vec![Entity { x: 1.0, y: 1.0 }])]), Vec2::new(100.0, 100.0));
        let agent = &commands[commands.len() - 2..];
        assert_eq!(agent[0], DrawCommand::Circle { center: Pos2::new(15.0, 15.0), radius: AGENT_RADIUS, color: YELLOW });
        assert!(matches!(&agent[1], DrawCommand::Label { text, center, .. } if text == "4" && *center == Pos2::new(15.0, 15.0)));
    }

    #[test]
    fn obstruction_is_neutral() {
        let commands = compose(&snapshot(&[(21, vec![Entity { x: 9.0, y: 9.0 }])]), Vec2::new(100.0, 100.0));
        assert!(matches!(commands.last(), Some(DrawCommand::FillRect { color, .. }) if *color == GRAY));
    }

    #[test]
    fn raster_cells_sit_between_grid_and_entities() {
        let mut snapshot = snapshot(&[(19, vec![Entity { x: 0.0, y: 0.0 }])]);
        snapshot.raster = Some(Arc::new(RasterGrid::from_rows(vec![vec!["1".to_string(), "0".to_string()]])));

        let commands = compose(&snapshot, Vec2::new(100.0, 100.0));
        let raster = &commands[19..21];
        assert!(matches!(raster[0], DrawCommand::FillRect { color, .. } if color == OCCUPIED_RASTER_COLOR));
        assert!(matches!(raster[1], DrawCommand::FillRect { color, .. } if color == SCENE_BACKGROUND));
        assert!(matches!(commands[21], DrawCommand::FillRect { color, .. } if color == ORANGE));
    }

    #[test]
    fn flipping_mirrors_geometry_but_not_text() {
        let rect = DrawCommand::FillRect { rect: Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(10.0, 20.0)), color: RED };
        assert_eq!(
            rect.flipped(100.0),
            DrawCommand::FillRect { rect: Rect::from_min_max(Pos2::new(0.0, 80.0), Pos2::new(10.0, 100.0)), color: RED }
        );

        let label = DrawCommand::Label { center: Pos2::new(5.0, 5.0), text: "7".to_string(), size: 10.0, color: BLACK };
        assert_eq!(
            label.flipped(100.0),
            DrawCommand::Label { center: Pos2::new(5.0, 95.0), text: "7".to_string(), size: 10.0, color: BLACK }
        );
    }
}
