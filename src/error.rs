use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Transport failures. Every variant is recoverable: the connection is dropped and re-established.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("connection refused by the simulation endpoint")]
    Refused,

    #[error("connection reset by the simulation")]
    Reset,

    #[error("timed out waiting for the simulation")]
    Timeout,

    #[error("connection closed")]
    Closed,
}

impl ConnectionError {
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ConnectionError::Refused,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ConnectionError::Timeout,
            io::ErrorKind::NotConnected => ConnectionError::Closed,
            _ => ConnectionError::Reset,
        }
    }
}

#[derive(Error, Debug)]
pub enum VizError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Malformed snapshot message: {0}")]
    MalformedMessage(String),

    #[error("Could not open a session with the simulation: {0}")]
    Handshake(String),

    #[error("Shutting down")]
    ShuttingDown,

    #[error("Raster file {0} could not be read")]
    RasterUnavailable(PathBuf),

    #[error("An I/O error occurred: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Could not parse settings: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),

    #[error("Could not decode image: {0}")]
    Image(#[from] image::ImageError),
}

impl VizError {
    /// Errors after which the live connection must be discarded and the entity map cleared.
    pub fn drops_connection(&self) -> bool {
        matches!(self, VizError::Connection(_) | VizError::MalformedMessage(_))
    }
}
