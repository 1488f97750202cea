use std::sync::Arc;
use std::time::Duration;

use egui::Align2;
use egui::Color32;
use egui::CornerRadius;
use egui::FontId;
use egui::Pos2;
use egui::Rect;
use egui::Shape;
use egui::Stroke;
use egui::StrokeKind;
use egui::Vec2;

use crate::connection::ConnectionState;
use crate::connection::ConnectionStatus;
use crate::input::InputController;
use crate::input::InputEvent;
use crate::orchestrator::Orchestrator;
use crate::orchestrator::RunFlag;
use crate::render::FrameSlot;
use crate::render::GAME_AREA_INSET;
use crate::scene::BLACK;
use crate::scene::DrawCommand;
use crate::scene::GRAY;
use crate::scene::HudInfo;
use crate::scene::PROGRESS_GREEN;
use crate::scene::RenderedFrame;
use crate::scene::WHITE;
use crate::settings::VizSettings;

pub const PLACEHOLDER_TEXT: &str = "Waiting for MARS simulation to start...";

const HUD_FONT_SIZE: f32 = 14.0;
/// Distance of the HUD label baseline centre from the bottom of the window.
const HUD_LABEL_OFFSET: f32 = 12.0;
/// Left edges of the tick, FPS and desired-FPS labels.
const HUD_LABEL_X: [f32; 3] = [10.0, 95.0, 180.0];
const PROGRESS_BAR_OFFSET: f32 = 40.0;
const PROGRESS_BAR_HEIGHT: f32 = 20.0;
const PROGRESS_BAR_PADDING: f32 = 3.0;
/// Lets status changes show up while no frames are being published.
const IDLE_REPAINT: Duration = Duration::from_millis(100);

/// The window: blits frames composed by the render thread and turns input into control changes.
pub struct LiveVizApp {
    input: InputController,
    frames: Arc<FrameSlot>,
    status: ConnectionStatus,
    running: RunFlag,
}

impl LiveVizApp {
    pub fn new(orchestrator: &Orchestrator, settings: &VizSettings) -> Self {
        let connection = orchestrator.connection();
        let window = Vec2::new(settings.window_size[0] as f32, settings.window_size[1] as f32);
        let input = InputController::new(
            Arc::clone(&connection),
            orchestrator.params(),
            orchestrator.running(),
            settings.initial_wait_ms,
            settings.min_window_size,
            window,
        );

        Self { input, frames: orchestrator.frames(), status: connection.status(), running: orchestrator.running() }
    }

    fn update_impl(&mut self, ctx: &egui::Context) {
        self.frames.attach_context(ctx);
        self.input.poll(ctx);

        if !self.running.is_running() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        egui::CentralPanel::default().frame(egui::Frame::NONE.fill(GRAY)).show(ctx, |ui| {
            let window = ui.max_rect();
            self.input.apply(InputEvent::Resize(window.size()));

            match self.frames.latest().filter(|_| self.status.get() == ConnectionState::Connected) {
                Some(frame) => paint_frame(ui, &frame),
                None => ui.painter().extend(placeholder_shapes(window, ctx)),
            }
        });

        ctx.request_repaint_after(IDLE_REPAINT);
    }
}

impl eframe::App for LiveVizApp {
    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_impl(ctx);
    }
}

// ─── Painting ────────────────────────────────────────────────────────────────

fn text_shape(ctx: &egui::Context, pos: Pos2, anchor: Align2, text: String, size: f32, color: Color32) -> Shape {
    let galley = ctx.fonts_mut(|f| f.layout_no_wrap(text, FontId::proportional(size), color));
    let rect = anchor.anchor_size(pos, galley.size());
    Shape::galley(rect.min, galley, color)
}

/// Translate one composed command into window space.
fn draw_command_to_shapes(cmd: &DrawCommand, origin: Vec2, ctx: &egui::Context) -> Shape {
    match cmd {
        DrawCommand::FillRect { rect, color } => Shape::rect_filled(rect.translate(origin), CornerRadius::ZERO, *color),
        DrawCommand::Line { from, to, width, color } => {
            Shape::line_segment([*from + origin, *to + origin], Stroke::new(*width, *color))
        }
        DrawCommand::Circle { center, radius, color } => Shape::circle_filled(*center + origin, *radius, *color),
        DrawCommand::Label { center, text, size, color } => {
            text_shape(ctx, *center + origin, Align2::CENTER_CENTER, text.clone(), *size, *color)
        }
    }
}

fn game_area_rect(window: Rect, viewport: Vec2) -> Rect {
    Rect::from_min_size(window.min + Vec2::splat(GAME_AREA_INSET), viewport)
}

/// Blit the scene clipped to the game area, like an offscreen surface, then the border and HUD over the window.
fn paint_frame(ui: &egui::Ui, frame: &RenderedFrame) {
    let window = ui.max_rect();
    let game_area = game_area_rect(window, frame.viewport);
    let origin = game_area.min.to_vec2();
    let ctx = ui.ctx();

    ui.painter()
        .with_clip_rect(game_area)
        .extend(frame.commands.iter().map(|cmd| draw_command_to_shapes(cmd, origin, ctx)));

    let painter = ui.painter();
    painter.add(Shape::rect_stroke(game_area, CornerRadius::ZERO, Stroke::new(1.0, WHITE), StrokeKind::Outside));
    painter.extend(hud_shapes(&frame.hud, window, ctx));
}

fn hud_shapes(hud: &HudInfo, window: Rect, ctx: &egui::Context) -> Vec<Shape> {
    let label_y = window.max.y - HUD_LABEL_OFFSET;
    let labels = [
        format!("Tick: {}", hud.tick),
        format!("FPS: {:.2}", hud.measured_fps),
        format!("Desired FPS: {} (use up- and down arrows to change)", hud.desired_fps),
    ];

    let mut shapes: Vec<Shape> = labels
        .into_iter()
        .zip(HUD_LABEL_X)
        .map(|(text, x)| text_shape(ctx, Pos2::new(window.min.x + x, label_y), Align2::LEFT_CENTER, text, HUD_FONT_SIZE, WHITE))
        .collect();

    if let Some(progress) = hud.progress {
        shapes.extend(progress_bar_shapes(window, progress));
    }
    shapes
}

fn progress_bar_shapes(window: Rect, progress: f32) -> Vec<Shape> {
    let bar = Rect::from_min_size(
        Pos2::new(window.min.x + GAME_AREA_INSET, window.max.y - PROGRESS_BAR_OFFSET),
        Vec2::new(window.width() - 2.0 * GAME_AREA_INSET, PROGRESS_BAR_HEIGHT),
    );
    let inner_width = (bar.width() - 2.0 * PROGRESS_BAR_PADDING) * progress.clamp(0.0, 1.0);
    let inner = Rect::from_min_size(
        bar.min + Vec2::splat(PROGRESS_BAR_PADDING),
        Vec2::new(inner_width, bar.height() - 2.0 * PROGRESS_BAR_PADDING),
    );

    vec![
        Shape::rect_filled(bar, CornerRadius::ZERO, BLACK),
        Shape::rect_stroke(bar, CornerRadius::ZERO, Stroke::new(1.0, WHITE), StrokeKind::Inside),
        Shape::rect_filled(inner, CornerRadius::ZERO, PROGRESS_GREEN),
    ]
}

fn placeholder_shapes(window: Rect, ctx: &egui::Context) -> Vec<Shape> {
    vec![
        Shape::rect_filled(window, CornerRadius::ZERO, GRAY),
        text_shape(ctx, window.center(), Align2::CENTER_CENTER, PLACEHOLDER_TEXT.to_string(), HUD_FONT_SIZE, WHITE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_of(shape: &Shape) -> Rect {
        match shape {
            Shape::Rect(rect) => rect.rect,
            other => panic!("not a rect: {other:?}"),
        }
    }

    #[test]
    fn progress_bar_geometry() {
        let window = Rect::from_min_size(Pos2::ZERO, Vec2::new(1200.0, 880.0));
        let shapes = progress_bar_shapes(window, 0.05);

        let bar = rect_of(&shapes[0]);
        assert_eq!(bar.min, Pos2::new(10.0, 840.0));
        assert_eq!(bar.size(), Vec2::new(1180.0, 20.0));

        let inner = rect_of(&shapes[2]);
        assert_eq!(inner.min, Pos2::new(13.0, 843.0));
        assert!((inner.width() - 1174.0 * 0.05).abs() < 1e-3);
        assert_eq!(inner.height(), 14.0);
    }

    #[test]
    fn overfull_progress_stays_inside_bar() {
        let window = Rect::from_min_size(Pos2::ZERO, Vec2::new(600.0, 600.0));
        let inner = rect_of(&progress_bar_shapes(window, 1.5)[2]);
        assert_eq!(inner.max.x, 587.0);
    }

    #[test]
    fn scene_is_clipped_to_game_area() {
        let window = Rect::from_min_size(Pos2::ZERO, Vec2::new(600.0, 600.0));
        let viewport = crate::render::game_area_size(window.size());
        let game_area = game_area_rect(window, viewport);
        // straddles the bottom edge of the scene
        let stray = Rect::from_min_size(Pos2::new(150.0, viewport.y - 5.0), Vec2::splat(10.0));
        let frame = RenderedFrame {
            viewport,
            commands: vec![DrawCommand::FillRect { rect: stray, color: crate::scene::ORANGE }],
            hud: HudInfo { tick: 1, progress: Some(0.5), measured_fps: 60.0, desired_fps: 60 },
            frame_index: 0,
        };

        let ctx = egui::Context::default();
        let input = egui::RawInput { screen_rect: Some(window), ..Default::default() };
        let output = ctx.run(input, |ctx| {
            egui::CentralPanel::default().frame(egui::Frame::NONE).show(ctx, |ui| paint_frame(ui, &frame));
        });

        let scene: Vec<_> =
            output.shapes.iter().filter(|clipped| matches!(&clipped.shape, Shape::Rect(r) if r.fill == crate::scene::ORANGE)).collect();
        assert_eq!(scene.len(), 1);
        assert!(game_area.contains_rect(scene[0].clip_rect));
        assert!(!scene[0].clip_rect.contains_rect(stray.translate(game_area.min.to_vec2())));
        assert!(scene[0].clip_rect.max.y <= game_area.max.y);

        // the HUD is not confined to the game area
        assert!(output.shapes.iter().any(|clipped| !game_area.contains_rect(clipped.clip_rect)));
    }

    #[test]
    fn commands_are_offset_into_game_area() {
        let ctx = egui::Context::default();
        let cmd = DrawCommand::FillRect { rect: Rect::from_min_max(Pos2::ZERO, Pos2::new(10.0, 10.0)), color: BLACK };
        let shape = draw_command_to_shapes(&cmd, Vec2::new(10.0, 10.0), &ctx);
        assert_eq!(rect_of(&shape), Rect::from_min_max(Pos2::new(10.0, 10.0), Pos2::new(20.0, 20.0)));
    }
}
