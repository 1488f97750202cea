use std::sync::Arc;

use egui::Key;
use egui::Vec2;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::connection::ConnectionManager;
use crate::message::ControlMessage;
use crate::orchestrator::RunFlag;
use crate::render::RenderParams;

/// Shortest step delay the simulation may be asked for.
pub const MIN_WAIT_MS: u64 = 3;
/// Wait change per accelerate key press.
pub const ACCELERATE_STEP_MS: u64 = 3;
/// Wait change per decelerate key press.
pub const DECELERATE_STEP_MS: u64 = 10;
/// Desired FPS change per main-loop iteration while an arrow key is held.
pub const FPS_STEP: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Quit,
    /// Shorten the simulation's step delay.
    Accelerate,
    /// Lengthen the simulation's step delay.
    Decelerate,
    RaiseFps,
    LowerFps,
    Resize(Vec2),
}

/// Per-iteration input handling on the UI thread.
pub struct InputController {
    connection: Arc<ConnectionManager>,
    params: Arc<RenderParams>,
    running: RunFlag,
    wait_ms: u64,
    min_window: f32,
    window: Vec2,
}

impl InputController {
    pub fn new(
        connection: Arc<ConnectionManager>,
        params: Arc<RenderParams>,
        running: RunFlag,
        initial_wait_ms: u64,
        min_window: u32,
        window: Vec2,
    ) -> Self {
        Self { connection, params, running, wait_ms: initial_wait_ms.max(MIN_WAIT_MS), min_window: min_window as f32, window }
    }

    pub fn wait_ms(&self) -> u64 {
        self.wait_ms
    }

    /// Window size currently laid out, already floored.
    pub fn window(&self) -> Vec2 {
        self.window
    }

    /// Gather this iteration's events from egui.
    pub fn collect(ctx: &egui::Context) -> Vec<InputEvent> {
        ctx.input(|i| {
            let mut events = Vec::new();
            if i.viewport().close_requested() || i.key_pressed(Key::Q) {
                events.push(InputEvent::Quit);
            }
            if i.key_pressed(Key::ArrowLeft) {
                events.push(InputEvent::Accelerate);
            }
            if i.key_pressed(Key::ArrowRight) {
                events.push(InputEvent::Decelerate);
            }
            if i.key_down(Key::ArrowUp) {
                events.push(InputEvent::RaiseFps);
            }
            if i.key_down(Key::ArrowDown) {
                events.push(InputEvent::LowerFps);
            }
            events
        })
    }

    pub fn poll(&mut self, ctx: &egui::Context) {
        for event in Self::collect(ctx) {
            self.apply(event);
        }
    }

    pub fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::Quit => {
                if self.running.is_running() {
                    info!("Quit requested");
                }
                self.running.stop();
            }
            InputEvent::Accelerate => self.set_wait(self.wait_ms.saturating_sub(ACCELERATE_STEP_MS)),
            InputEvent::Decelerate => self.set_wait(self.wait_ms + DECELERATE_STEP_MS),
            InputEvent::RaiseFps => {
                self.params.set_desired_fps(self.params.desired_fps().saturating_add(FPS_STEP));
            }
            InputEvent::LowerFps => {
                self.params.set_desired_fps(self.params.desired_fps().saturating_sub(FPS_STEP));
            }
            InputEvent::Resize(window) => {
                let window = window.max(Vec2::splat(self.min_window));
                if window != self.window {
                    debug!(width = window.x, height = window.y, "Viewport resized");
                    self.window = window;
                    self.params.set_window_size(window);
                }
            }
        }
    }

    fn set_wait(&mut self, wait_ms: u64) {
        self.wait_ms = wait_ms.max(MIN_WAIT_MS);

        if !self.connection.is_connected() {
            debug!(wait_ms = self.wait_ms, "Not connected, keeping step delay locally");
            return;
        }
        if let Err(e) = self.connection.send_control(&ControlMessage { time_to_wait_ms: self.wait_ms }) {
            warn!("Could not send step delay to the simulation: {}", e);
        }
    }
}
