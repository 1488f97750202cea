#![warn(clippy::all, rust_2018_idioms)]
mod app;
pub mod connection;
pub mod error;
pub mod ingestion;
pub mod input;
pub mod mapper;
pub mod message;
pub mod orchestrator;
pub mod raster;
pub mod render;
pub mod scene;
pub mod settings;
pub mod snapshot;
pub use app::LiveVizApp;
pub const APP_NAME: &str = "MARS LiveViz";
