use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use egui::Vec2;
use parking_lot::Mutex;
use tracing::info;
use tracing::trace;

use crate::orchestrator::RunFlag;
use crate::scene::HudInfo;
use crate::scene::RenderedFrame;
use crate::scene::compose;
use crate::snapshot::SnapshotStore;

pub const MIN_FPS: u32 = 5;
pub const MAX_FPS: u32 = 1000;

/// Inset of the game area from the window's top-left corner.
pub const GAME_AREA_INSET: f32 = 10.0;
/// Window height reserved below the game area for the HUD.
pub const HUD_HEIGHT: f32 = 40.0;

/// Number of frames the measured frame rate is averaged over.
const FPS_SAMPLE_FRAMES: usize = 10;

/// Game-area size for a window of `window` points.
pub fn game_area_size(window: Vec2) -> Vec2 {
    Vec2::new(window.x - 2.0 * GAME_AREA_INSET, window.y - 2.0 * GAME_AREA_INSET - HUD_HEIGHT).max(Vec2::ZERO)
}

// ─── Parameters ──────────────────────────────────────────────────────────────

/// Knobs the UI thread turns and the render thread reads every frame.
pub struct RenderParams {
    desired_fps: AtomicU32,
    viewport: Mutex<Vec2>,
}

impl RenderParams {
    pub fn new(desired_fps: u32, window: Vec2) -> Self {
        Self { desired_fps: AtomicU32::new(desired_fps.clamp(MIN_FPS, MAX_FPS)), viewport: Mutex::new(game_area_size(window)) }
    }

    pub fn desired_fps(&self) -> u32 {
        self.desired_fps.load(Ordering::Relaxed)
    }

    /// Returns the value actually stored after clamping to `[MIN_FPS, MAX_FPS]`.
    pub fn set_desired_fps(&self, fps: u32) -> u32 {
        let fps = fps.clamp(MIN_FPS, MAX_FPS);
        self.desired_fps.store(fps, Ordering::Relaxed);
        fps
    }

    /// Game-area size the next frame is composed for.
    pub fn viewport(&self) -> Vec2 {
        *self.viewport.lock()
    }

    pub fn set_window_size(&self, window: Vec2) {
        *self.viewport.lock() = game_area_size(window);
    }
}

// ─── Frame pacing ────────────────────────────────────────────────────────────

/// Sleeps each frame to hold a target rate and reports the rate actually achieved.
pub struct FrameClock {
    last_tick: Option<Instant>,
    intervals: VecDeque<Duration>,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self { last_tick: None, intervals: VecDeque::with_capacity(FPS_SAMPLE_FRAMES) }
    }

    /// Block until a full frame at `fps` has passed since the previous tick.
    pub fn tick(&mut self, fps: u32) {
        let frame_time = Duration::from_secs_f64(1.0 / fps.max(1) as f64);

        if let Some(last) = self.last_tick {
            let elapsed = last.elapsed();
            if elapsed < frame_time {
                std::thread::sleep(frame_time - elapsed);
            }
        }

        let now = Instant::now();
        if let Some(last) = self.last_tick.replace(now) {
            self.record(now - last);
        }
    }

    fn record(&mut self, interval: Duration) {
        if self.intervals.len() == FPS_SAMPLE_FRAMES {
            self.intervals.pop_front();
        }
        self.intervals.push_back(interval);
    }

    /// Average rate over the last few frames, zero until two ticks happened.
    pub fn measured_fps(&self) -> f32 {
        let total: Duration = self.intervals.iter().sum();
        if total.is_zero() {
            return 0.0;
        }

        self.intervals.len() as f32 / total.as_secs_f32()
    }
}

// ─── Frame hand-off ──────────────────────────────────────────────────────────

struct FrameSlotState {
    frame: Option<Arc<RenderedFrame>>,
    /// Set by the UI thread on first draw so the render thread can request repaints.
    viewport_ctx: Option<egui::Context>,
}

/// Latest composed frame, shared from the render thread to the UI thread.
pub struct FrameSlot {
    state: Mutex<FrameSlotState>,
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSlot {
    pub fn new() -> Self {
        Self { state: Mutex::new(FrameSlotState { frame: None, viewport_ctx: None }) }
    }

    pub fn attach_context(&self, ctx: &egui::Context) {
        let mut state = self.state.lock();
        if state.viewport_ctx.is_none() {
            state.viewport_ctx = Some(ctx.clone());
        }
    }

    pub fn publish(&self, frame: Arc<RenderedFrame>) {
        let mut state = self.state.lock();
        state.frame = Some(frame);
        if let Some(ctx) = &state.viewport_ctx {
            ctx.request_repaint();
        }
    }

    pub fn latest(&self) -> Option<Arc<RenderedFrame>> {
        self.state.lock().frame.clone()
    }
}

// ─── Render loop ─────────────────────────────────────────────────────────────

/// Sole reader of the [`SnapshotStore`]. Composes frames at the desired rate and hands them to the UI.
pub struct RenderLoop {
    store: Arc<SnapshotStore>,
    params: Arc<RenderParams>,
    slot: Arc<FrameSlot>,
    running: RunFlag,
    clock: FrameClock,
    frames: u64,
}

impl RenderLoop {
    pub fn new(store: Arc<SnapshotStore>, params: Arc<RenderParams>, slot: Arc<FrameSlot>, running: RunFlag) -> Self {
        Self { store, params, slot, running, clock: FrameClock::new(), frames: 0 }
    }

    pub fn run(mut self) {
        info!("Render loop started");
        while self.running.is_running() {
            self.clock.tick(self.params.desired_fps());
            if let Some(frame) = self.render_frame() {
                self.slot.publish(frame);
            }
        }
        info!("Render loop stopped");
    }

    /// Compose one frame from the current snapshot, or `None` while nothing has been committed yet.
    pub fn render_frame(&mut self) -> Option<Arc<RenderedFrame>> {
        let viewport = self.params.viewport();
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return None;
        }

        let snapshot = self.store.read();
        if !snapshot.ready {
            return None;
        }
        let scene = compose(&snapshot, viewport);
        let ticks = snapshot.ticks;
        drop(snapshot);

        let commands = scene.iter().map(|command| command.flipped(viewport.y)).collect();
        let frame_index = self.frames;
        self.frames += 1;
        trace!(frame = frame_index, tick = ticks.current, "Composed frame");

        Some(Arc::new(RenderedFrame {
            viewport,
            commands,
            hud: HudInfo {
                tick: ticks.current,
                progress: ticks.progress(),
                measured_fps: self.clock.measured_fps(),
                desired_fps: self.params.desired_fps(),
            },
            frame_index,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SnapshotMessage;
    use crate::scene::DrawCommand;
    use crate::scene::ORANGE;
    use crate::snapshot::WorldBounds;

    const WINDOW: Vec2 = Vec2::new(120.0, 160.0);

    fn render_loop() -> (RenderLoop, Arc<SnapshotStore>) {
        let store = Arc::new(SnapshotStore::new(WorldBounds { min_x: 0, min_y: 0, max_x: 9, max_y: 9 }, 100));
        let params = Arc::new(RenderParams::new(360, WINDOW));
        let render = RenderLoop::new(Arc::clone(&store), params, Arc::new(FrameSlot::new()), RunFlag::new());
        (render, store)
    }

    #[test]
    fn game_area_leaves_room_for_hud() {
        assert_eq!(game_area_size(Vec2::new(1200.0, 880.0)), Vec2::new(1180.0, 820.0));
        assert_eq!(game_area_size(Vec2::new(5.0, 5.0)), Vec2::ZERO);
    }

    #[test]
    fn desired_fps_is_clamped() {
        let params = RenderParams::new(2, WINDOW);
        assert_eq!(params.desired_fps(), MIN_FPS);
        assert_eq!(params.set_desired_fps(5000), MAX_FPS);
        assert_eq!(params.set_desired_fps(42), 42);
    }

    #[test]
    fn skips_frames_until_ready() {
        let (mut render, store) = render_loop();
        assert!(render.render_frame().is_none());

        let message = SnapshotMessage::parse(br#"{"currentTick":5,"maxTicks":100,"t":19,"entities":[{"x":3,"y":4}]}"#).unwrap();
        store.commit(&message, None);

        let frame = render.render_frame().unwrap();
        assert_eq!(frame.viewport, Vec2::new(100.0, 100.0));
        assert_eq!(frame.hud.tick, 5);
        assert_eq!(frame.hud.progress, Some(0.05));
        assert_eq!(frame.hud.desired_fps, 360);
        // the hazard cell at (3, 4) spans y 40..50 in world space, 50..60 on screen
        assert_eq!(
            *frame.commands.last().unwrap(),
            DrawCommand::FillRect { rect: egui::Rect::from_min_max(egui::pos2(30.0, 50.0), egui::pos2(40.0, 60.0)), color: ORANGE }
        );
    }

    #[test]
    fn extreme_world_bounds_still_render() {
        let (mut render, store) = render_loop();
        store.commit(
            &SnapshotMessage::parse(br#"{"currentTick":1,"worldSize":{"minX":-9223372036854775808,"minY":0,"maxX":9223372036854775807,"maxY":9}}"#)
                .unwrap(),
            None,
        );
        assert_eq!(store.read().world_bounds, WorldBounds { min_x: 0, min_y: 0, max_x: 9, max_y: 9 });
        assert!(render.render_frame().is_some());

        // bounds that reach the store some other way are mapped without overflowing
        store.write().world_bounds = WorldBounds { min_x: i64::MIN, min_y: 0, max_x: i64::MAX, max_y: 9 };
        assert!(render.render_frame().is_some());

        store.write().world_bounds = WorldBounds { min_x: 0, min_y: 0, max_x: 1_000_000_000, max_y: 1_000_000_000 };
        let frame = render.render_frame().unwrap();
        assert_eq!(frame.commands.len(), 1);
    }

    #[test]
    fn releases_read_lock_after_composing() {
        let (mut render, store) = render_loop();
        store.commit(&SnapshotMessage::parse(br#"{"currentTick":1}"#).unwrap(), None);

        let frame = render.render_frame();
        assert!(frame.is_some());
        assert!(store.try_write().is_some());
    }

    #[test]
    fn frame_indices_increase() {
        let (mut render, store) = render_loop();
        store.commit(&SnapshotMessage::parse(br#"{"currentTick":1}"#).unwrap(), None);

        let first = render.render_frame().unwrap();
        let second = render.render_frame().unwrap();
        assert_eq!(second.frame_index, first.frame_index + 1);
    }

    #[test]
    fn slot_keeps_latest_frame() {
        let (mut render, store) = render_loop();
        store.commit(&SnapshotMessage::parse(br#"{"currentTick":1}"#).unwrap(), None);
        let slot = FrameSlot::new();
        assert!(slot.latest().is_none());

        let first = render.render_frame().unwrap();
        let second = render.render_frame().unwrap();
        slot.publish(first);
        slot.publish(Arc::clone(&second));
        assert_eq!(slot.latest().unwrap().frame_index, second.frame_index);
    }

    #[test]
    fn clock_paces_and_measures() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.measured_fps(), 0.0);

        let start = Instant::now();
        for _ in 0..4 {
            clock.tick(100);
        }
        // three full frame waits at 10 ms each
        assert!(start.elapsed() >= Duration::from_millis(30));
        let fps = clock.measured_fps();
        assert!(fps > 0.0 && fps <= 101.0, "{fps}");
    }

    #[test]
    fn clock_averages_over_last_ten_frames() {
        let mut clock = FrameClock::new();
        for _ in 0..5 {
            clock.record(Duration::from_millis(100));
        }
        for _ in 0..FPS_SAMPLE_FRAMES {
            clock.record(Duration::from_millis(10));
        }
        assert!((clock.measured_fps() - 100.0).abs() < 0.5);
    }
}
