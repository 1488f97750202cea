#![warn(clippy::all, rust_2018_idioms)]
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use std::path::Path;
use std::path::PathBuf;

use mars_liveviz::LiveVizApp;
use mars_liveviz::error::VizError;
use mars_liveviz::orchestrator::Orchestrator;
use mars_liveviz::settings::VizSettings;
use tracing::info;
use tracing::warn;

fn load_icon(path: &Path) -> Result<egui::IconData, VizError> {
    let image = image::open(path)?.into_rgba8();
    let (width, height) = image.dimensions();
    Ok(egui::IconData { rgba: image.into_raw(), width, height })
}

fn main() -> eframe::Result<()> {
    #[cfg(feature = "logging")]
    let _log_guard = {
        use tracing_appender::rolling::Rotation;
        use tracing_subscriber::EnvFilter;
        use tracing_subscriber::Layer;
        use tracing_subscriber::fmt;
        use tracing_subscriber::fmt::time::LocalTime;
        use tracing_subscriber::prelude::*;

        let file_appender = tracing_appender::rolling::Builder::new()
            .rotation(Rotation::HOURLY)
            .max_log_files(1)
            .filename_prefix("mars_liveviz.log")
            .build(".")
            .expect("failed to build file appender");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::Layer::new()
                    .pretty()
                    .with_ansi(true)
                    .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
            )
            .with(
                fmt::Layer::new()
                    .with_writer(non_blocking)
                    .with_timer(LocalTime::rfc_3339())
                    .with_ansi(false)
                    .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
            );
        tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
        guard
    };

    let settings_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = VizSettings::load(settings_path.as_deref()).expect("failed to load settings");

    let [width, height] = settings.window_size.map(|v| v.max(settings.min_window_size) as f32);
    let min_size = settings.min_window_size as f32;
    let mut viewport = egui::ViewportBuilder::default()
        .with_inner_size([width, height])
        .with_min_inner_size([min_size, min_size])
        .with_title(settings.title.clone());
    if let Some(path) = settings.icon_path.as_deref() {
        match load_icon(path) {
            Ok(icon) => viewport = viewport.with_icon(icon),
            Err(e) => warn!("Window icon {:?} not loaded: {}", path, e),
        }
    }
    let native_options = eframe::NativeOptions { viewport, ..Default::default() };

    let orchestrator = Orchestrator::start(&settings).expect("failed to start background threads");
    let app = LiveVizApp::new(&orchestrator, &settings);

    let result = eframe::run_native(mars_liveviz::APP_NAME, native_options, Box::new(move |_cc| Ok(Box::new(app))));

    orchestrator.shutdown();
    info!("Exited");
    result
}
