use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;

use crate::error::VizError;
use crate::snapshot::WorldBounds;

pub const DEFAULT_SETTINGS_FILE: &str = "liveviz.toml";

fn default_uri() -> String {
    "ws://127.0.0.1:4567/vis".to_string()
}

fn default_raster_path() -> Option<PathBuf> {
    Some(PathBuf::from("HTF.csv"))
}

fn default_icon_path() -> Option<PathBuf> {
    Some(PathBuf::from("icon.png"))
}

fn default_title() -> String {
    "MARS-Mini-VIS".to_string()
}

fn default_window_size() -> [u32; 2] {
    [1200, 880]
}

pub const fn default_bool<const V: bool>() -> bool {
    V
}

pub const fn default_u32<const V: u32>() -> u32 {
    V
}

pub const fn default_u64<const V: u64>() -> u64 {
    V
}

pub const fn default_i64<const V: i64>() -> i64 {
    V
}

fn default_world_bounds() -> WorldBounds {
    WorldBounds { min_x: 0, min_y: 0, max_x: 119, max_y: 87 }
}

/// Immutable client configuration, produced once at startup and handed to every component that needs it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VizSettings {
    /// Endpoint of the simulation's visualization socket.
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Semicolon separated floor-plan raster.
    #[serde(default = "default_raster_path")]
    pub raster_path: Option<PathBuf>,

    /// Reload the raster when the file changes on disk.
    #[serde(default = "default_bool::<true>")]
    pub watch_raster: bool,

    #[serde(default = "default_icon_path")]
    pub icon_path: Option<PathBuf>,

    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_window_size")]
    pub window_size: [u32; 2],

    /// Both window dimensions are floored to this many pixels.
    #[serde(default = "default_u32::<500>")]
    pub min_window_size: u32,

    #[serde(default = "default_u32::<360>")]
    pub initial_fps: u32,

    /// Initial simulation step delay requested from the server.
    #[serde(default = "default_u64::<10>")]
    pub initial_wait_ms: u64,

    #[serde(default = "default_u64::<2000>")]
    pub reconnect_delay_ms: u64,

    /// World extent used for scaling until the simulation reports its own.
    #[serde(default = "default_world_bounds")]
    pub default_world_bounds: WorldBounds,

    #[serde(default = "default_i64::<1000>")]
    pub default_max_ticks: i64,
}

impl Default for VizSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            raster_path: default_raster_path(),
            watch_raster: true,
            icon_path: default_icon_path(),
            title: default_title(),
            window_size: default_window_size(),
            min_window_size: 500,
            initial_fps: 360,
            initial_wait_ms: 10,
            reconnect_delay_ms: 2000,
            default_world_bounds: default_world_bounds(),
            default_max_ticks: 1000,
        }
    }
}

impl VizSettings {
    pub fn from_toml_str(data: &str) -> Result<Self, VizError> {
        Ok(toml::from_str(data)?)
    }

    pub fn load_from(path: &Path) -> Result<Self, VizError> {
        let data = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&data)?;
        info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Explicit path if one was given, otherwise `liveviz.toml` in the working directory, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, VizError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let fallback = Path::new(DEFAULT_SETTINGS_FILE);
        if fallback.exists() {
            Self::load_from(fallback)
        } else {
            debug!("No settings file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
