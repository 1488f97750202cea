use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use futures_util::SinkExt;
use futures_util::StreamExt;
use futures_util::stream::SplitSink;
use futures_util::stream::SplitStream;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::ConnectionError;
use crate::error::VizError;
use crate::message::ControlMessage;
use crate::orchestrator::RunFlag;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for a single connection attempt before it counts as a timeout.
const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);
/// Granularity at which a retry wait notices shutdown.
const RETRY_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Read-only view of the manager's connection state, for display.
#[derive(Clone)]
pub struct ConnectionStatus(Arc<Mutex<ConnectionState>>);

impl ConnectionStatus {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(ConnectionState::Disconnected)))
    }

    pub fn get(&self) -> ConnectionState {
        *self.0.lock()
    }

    fn set(&self, state: ConnectionState) {
        *self.0.lock() = state;
    }
}

/// Where the ingestion loop gets its messages from.
pub trait SnapshotSource: Send + Sync {
    type Connection: Send;

    /// Block until a connection is established. Recoverable failures are retried internally.
    fn connect(&self) -> Result<Self::Connection, VizError>;

    /// Block until the next message arrives.
    fn receive_message(&self, connection: &mut Self::Connection) -> Result<Vec<u8>, ConnectionError>;

    /// Discard a connection that is no longer usable.
    fn disconnect(&self, connection: Self::Connection);
}

/// The receive half of a live websocket session. Owned by the ingestion loop.
pub struct Connection {
    id: u64,
    incoming: SplitStream<WsStream>,
}

impl Connection {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Owns the socket lifecycle. Receives go through the [`Connection`] handed to the ingestion loop;
/// sends go through a writer task so they can interleave with a blocked receive.
pub struct ConnectionManager {
    uri: String,
    retry_delay: Duration,
    runtime: Arc<Runtime>,
    running: RunFlag,
    status: ConnectionStatus,
    outbound: Mutex<Option<(u64, mpsc::UnboundedSender<Message>)>>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    pub fn new(uri: impl Into<String>, retry_delay: Duration, runtime: Arc<Runtime>, running: RunFlag) -> Self {
        Self {
            uri: uri.into(),
            retry_delay,
            runtime,
            running,
            status: ConnectionStatus::new(),
            outbound: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.get()
    }

    pub fn is_connected(&self) -> bool {
        self.outbound.lock().is_some()
    }

    /// Connect, retrying forever at a fixed delay while the simulation is not reachable yet.
    /// Only a non-retryable handshake failure or shutdown ends the loop without a connection.
    pub fn connect(&self) -> Result<Connection, VizError> {
        self.status.set(ConnectionState::Connecting);
        info!("Connecting to simulation at {} ...", self.uri);

        loop {
            if !self.running.is_running() {
                self.status.set(ConnectionState::Disconnected);
                return Err(VizError::ShuttingDown);
            }

            let attempt = self
                .runtime
                .block_on(async { tokio::time::timeout(CONNECT_ATTEMPT_TIMEOUT, tokio_tungstenite::connect_async(self.uri.as_str())).await });

            let failure = match attempt {
                Ok(Ok((stream, _response))) => return Ok(self.register(stream)),
                Ok(Err(e)) => match classify_connect_error(&e) {
                    Some(kind) => kind,
                    None => {
                        warn!("Simulation rejected the connection: {}", e);
                        self.status.set(ConnectionState::Failed);
                        return Err(VizError::Handshake(e.to_string()));
                    }
                },
                Err(_elapsed) => ConnectionError::Timeout,
            };

            info!("Waiting for running simulation ... ({})", failure);
            self.wait_before_retry();
        }
    }

    fn register(&self, stream: WsStream) -> Connection {
        let (sink, incoming) = stream.split();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let sender = spawn_writer(&self.runtime, id, sink);

        *self.outbound.lock() = Some((id, sender));
        self.status.set(ConnectionState::Connected);
        info!(connection = id, "Connected to simulation");

        Connection { id, incoming }
    }

    fn wait_before_retry(&self) {
        let deadline = Instant::now() + self.retry_delay;
        while self.running.is_running() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(RETRY_POLL.min(deadline - now));
        }
    }

    pub fn receive_message(&self, connection: &mut Connection) -> Result<Vec<u8>, ConnectionError> {
        self.runtime.block_on(async {
            loop {
                match connection.incoming.next().await {
                    Some(Ok(Message::Text(text))) => return Ok(text.as_bytes().to_vec()),
                    Some(Ok(Message::Binary(data))) => return Ok(data.to_vec()),
                    Some(Ok(Message::Close(frame))) => {
                        debug!(connection = connection.id, "Simulation closed the socket: {:?}", frame);
                        return Err(ConnectionError::Closed);
                    }
                    // Ping/pong and raw frames carry no snapshot data
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(classify_transport_error(&e)),
                    None => return Err(ConnectionError::Closed),
                }
            }
        })
    }

    /// Queue a text message on the live connection.
    pub fn send_message(&self, payload: String) -> Result<(), ConnectionError> {
        let outbound = self.outbound.lock();
        let Some((_, sender)) = outbound.as_ref() else {
            return Err(ConnectionError::Closed);
        };

        sender.send(Message::text(payload)).map_err(|_closed| ConnectionError::Closed)
    }

    pub fn send_control(&self, control: &ControlMessage) -> Result<(), VizError> {
        let payload = control.to_json()?;
        self.send_message(payload)?;
        debug!(wait_ms = control.time_to_wait_ms, "Sent control message");
        Ok(())
    }

    pub fn disconnect(&self, connection: Connection) {
        let mut outbound = self.outbound.lock();
        if outbound.as_ref().is_some_and(|(id, _)| *id == connection.id) {
            // Dropping the sender ends the writer task, which closes the sink.
            *outbound = None;
        }
        drop(outbound);

        self.status.set(ConnectionState::Disconnected);
        info!(connection = connection.id, "Dropped connection to simulation");
    }
}

impl SnapshotSource for ConnectionManager {
    type Connection = Connection;

    fn connect(&self) -> Result<Connection, VizError> {
        ConnectionManager::connect(self)
    }

    fn receive_message(&self, connection: &mut Connection) -> Result<Vec<u8>, ConnectionError> {
        ConnectionManager::receive_message(self, connection)
    }

    fn disconnect(&self, connection: Connection) {
        ConnectionManager::disconnect(self, connection)
    }
}

fn spawn_writer(runtime: &Runtime, id: u64, mut sink: SplitSink<WsStream, Message>) -> mpsc::UnboundedSender<Message> {
    let (sender, mut receiver) = mpsc::unbounded_channel::<Message>();

    runtime.spawn(async move {
        while let Some(message) = receiver.recv().await {
            if let Err(e) = sink.send(message).await {
                debug!(connection = id, "Outbound send failed: {}", e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    sender
}

pub(crate) fn classify_transport_error(err: &WsError) -> ConnectionError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => ConnectionError::Closed,
        WsError::Io(io) => ConnectionError::from_io(io),
        _ => ConnectionError::Reset,
    }
}

/// `None` means retrying cannot help (bad URI, HTTP level rejection).
pub(crate) fn classify_connect_error(err: &WsError) -> Option<ConnectionError> {
    match err {
        WsError::Url(_) | WsError::Http(_) | WsError::HttpFormat(_) => None,
        other => Some(classify_transport_error(other)),
    }
}
