use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::connection::SnapshotSource;
use crate::error::VizError;
use crate::message::SnapshotMessage;
use crate::orchestrator::RunFlag;
use crate::raster::RasterSource;
use crate::snapshot::SnapshotStore;

/// Receives snapshot messages and commits them into the store. Sole writer of the [`SnapshotStore`].
pub struct IngestionLoop<S: SnapshotSource> {
    source: Arc<S>,
    store: Arc<SnapshotStore>,
    raster: RasterSource,
    running: RunFlag,
    retry_delay: Duration,
    connection: Option<S::Connection>,
}

impl<S: SnapshotSource> IngestionLoop<S> {
    pub fn new(source: Arc<S>, store: Arc<SnapshotStore>, raster: RasterSource, running: RunFlag, retry_delay: Duration) -> Self {
        Self { source, store, raster, running, retry_delay, connection: None }
    }

    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    pub fn run(mut self) {
        info!("Ingestion loop started");
        while self.running.is_running() {
            match self.step() {
                Ok(()) => {}
                Err(VizError::ShuttingDown) => break,
                Err(e) if e.drops_connection() => {
                    warn!("Could not receive data, is the simulation still running? ({})", e);
                }
                Err(e) => {
                    error!("Ingestion cycle failed: {}", e);
                    std::thread::sleep(self.retry_delay);
                }
            }
        }

        if let Some(connection) = self.connection.take() {
            self.source.disconnect(connection);
        }
        info!("Ingestion loop stopped");
    }

    /// One cycle: ensure a connection, receive one message, commit it.
    ///
    /// Any transport failure, empty payload or unparseable payload discards the connection and
    /// clears the entity map before the error is returned.
    pub fn step(&mut self) -> Result<(), VizError> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => self.source.connect()?,
        };
        let connection = self.connection.insert(connection);

        let payload = match self.source.receive_message(connection) {
            Ok(payload) => payload,
            Err(e) => {
                self.discard_connection();
                return Err(e.into());
            }
        };

        let message = match SnapshotMessage::parse(&payload) {
            Ok(message) => message,
            Err(e) => {
                self.discard_connection();
                return Err(match e {
                    VizError::Json(json) => VizError::MalformedMessage(json.to_string()),
                    other => other,
                });
            }
        };

        self.store.commit(&message, self.raster.current());
        Ok(())
    }

    fn discard_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.source.disconnect(connection);
        }
        self.store.clear_entities();
        debug!("Cleared entities after losing the connection");
    }
}
