use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use egui::Vec2;
use tokio::runtime::Runtime;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::connection::ConnectionManager;
use crate::error::VizError;
use crate::ingestion::IngestionLoop;
use crate::raster::RasterSource;
use crate::render::FrameSlot;
use crate::render::RenderLoop;
use crate::render::RenderParams;
use crate::settings::VizSettings;
use crate::snapshot::SnapshotStore;

/// How long shutdown waits for the ingestion thread before leaving it to process exit.
const INGESTION_JOIN_GRACE: Duration = Duration::from_millis(500);

/// Cooperative cancellation signal shared by every loop. Starts raised; lowering it is final.
#[derive(Clone, Debug)]
pub struct RunFlag(Arc<AtomicBool>);

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl RunFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Owns the ingestion and render threads for the lifetime of the window.
pub struct Orchestrator {
    running: RunFlag,
    connection: Arc<ConnectionManager>,
    params: Arc<RenderParams>,
    frames: Arc<FrameSlot>,
    ingestion: Option<JoinHandle<()>>,
    render: Option<JoinHandle<()>>,
    // Kept alive until shutdown so the writer tasks outlive the UI.
    _runtime: Arc<Runtime>,
}

impl Orchestrator {
    pub fn start(settings: &VizSettings) -> Result<Self, VizError> {
        let running = RunFlag::new();
        let runtime = Arc::new(tokio::runtime::Builder::new_multi_thread().worker_threads(1).enable_all().build()?);

        let connection = Arc::new(ConnectionManager::new(
            settings.uri.clone(),
            settings.reconnect_delay(),
            Arc::clone(&runtime),
            running.clone(),
        ));
        let store = Arc::new(SnapshotStore::new(settings.default_world_bounds, settings.default_max_ticks));
        let raster = match &settings.raster_path {
            Some(path) => RasterSource::open(path, settings.watch_raster),
            None => RasterSource::empty(),
        };

        let window = Vec2::new(settings.window_size[0] as f32, settings.window_size[1] as f32);
        let params = Arc::new(RenderParams::new(settings.initial_fps, window));
        let frames = Arc::new(FrameSlot::new());

        let ingestion_loop =
            IngestionLoop::new(Arc::clone(&connection), Arc::clone(&store), raster, running.clone(), settings.reconnect_delay());
        let ingestion = std::thread::Builder::new().name("ingestion".to_string()).spawn(move || ingestion_loop.run())?;

        let render_loop = RenderLoop::new(store, Arc::clone(&params), Arc::clone(&frames), running.clone());
        let render = match std::thread::Builder::new().name("render".to_string()).spawn(move || render_loop.run()) {
            Ok(handle) => handle,
            Err(e) => {
                running.stop();
                return Err(e.into());
            }
        };

        info!("Started ingestion and render threads for {}", settings.uri);

        Ok(Self { running, connection, params, frames, ingestion: Some(ingestion), render: Some(render), _runtime: runtime })
    }

    pub fn running(&self) -> RunFlag {
        self.running.clone()
    }

    pub fn connection(&self) -> Arc<ConnectionManager> {
        Arc::clone(&self.connection)
    }

    pub fn params(&self) -> Arc<RenderParams> {
        Arc::clone(&self.params)
    }

    pub fn frames(&self) -> Arc<FrameSlot> {
        Arc::clone(&self.frames)
    }

    /// Lower the run flag and wait for both loops. The ingestion thread may be parked in a receive
    /// that never returns; after a short grace period it is left for process exit to reclaim.
    pub fn shutdown(mut self) {
        self.running.stop();
        info!("Shutting down");

        if let Some(render) = self.render.take()
            && render.join().is_err()
        {
            warn!("Render thread panicked");
        }

        if let Some(ingestion) = self.ingestion.take() {
            let deadline = Instant::now() + INGESTION_JOIN_GRACE;
            while !ingestion.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }

            if ingestion.is_finished() {
                if ingestion.join().is_err() {
                    warn!("Ingestion thread panicked");
                }
            } else {
                debug!("Ingestion thread still blocked on the socket, detaching it");
            }
        }

        info!("Shutdown complete");
    }
}
