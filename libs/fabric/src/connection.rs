//! Connection handles and the typed event callbacks they drive.
//!
//! Every connection, whatever provider created it, is run by the same
//! driver: one task dials and then reads frames, one task writes them.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::transport::{FrameWriter, Halves};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Address of a peer as understood by a channel provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<SocketAddr> for PeerId {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

/// Lifecycle of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }
}

/// Callbacks for a single connection
///
/// `on_data` is called once per inbound frame, in arrival order, from the
/// connection's reader task. Handlers that need parallelism spawn.
#[async_trait::async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    /// The connection is established and `send` may be used
    async fn on_open(&self, _conn: &Connection) {}

    /// A frame arrived
    async fn on_data(&self, conn: &Connection, bytes: Vec<u8>);

    /// Dialing failed, or the connection broke
    async fn on_error(&self, _conn: &Connection, _error: &Error) {}

    /// An open connection is gone. Fires at most once.
    async fn on_close(&self, _conn: &Connection) {}
}

/// Callbacks for a listening peer
pub trait ConnectionAcceptor: Send + Sync + 'static {
    /// A peer connected; return the handler for its events
    fn on_connection(&self, conn: &Connection) -> Arc<dyn ConnectionHandler>;

    /// The listener itself failed, e.g. accept returned an error
    fn on_error(&self, _error: &Error) {}
}

struct Shared {
    id: u64,
    remote: PeerId,
    state: AtomicU8,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    shutdown: watch::Sender<bool>,
}

/// Handle to one connection; cheap to clone
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("remote", &self.shared.remote)
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn remote(&self) -> &PeerId {
        &self.shared.remote
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Queue a frame for delivery
    ///
    /// Returns once the frame is queued; there is no delivery acknowledgement.
    pub fn send(&self, bytes: Vec<u8>) -> Result<()> {
        match self.state() {
            ConnectionState::Connecting => Err(Error::NotOpen),
            ConnectionState::Closed => Err(Error::ConnectionClosed),
            ConnectionState::Open => self
                .shared
                .outbound
                .send(bytes)
                .map_err(|_| Error::ConnectionClosed),
        }
    }

    /// Close the connection. Frames already queued are still written.
    pub fn close(&self) {
        self.set_state(ConnectionState::Closed);
        self.shared.shutdown.send_replace(true);
    }

    fn set_state(&self, state: ConnectionState) {
        self.shared.state.store(state as u8, Ordering::SeqCst);
    }

    fn open(&self) -> bool {
        self.shared
            .state
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Open as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }
}

/// A connection whose driver has not started yet
///
/// Lets an acceptor see the `Connection` before choosing its handler.
pub(crate) struct PendingConnection {
    conn: Connection,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    shutdown: watch::Receiver<bool>,
}

impl PendingConnection {
    pub(crate) fn new(remote: PeerId) -> Self {
        let (outbound_tx, outbound) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown) = watch::channel(false);
        let conn = Connection {
            shared: Arc::new(Shared {
                id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
                remote,
                state: AtomicU8::new(ConnectionState::Connecting as u8),
                outbound: outbound_tx,
                shutdown: shutdown_tx,
            }),
        };
        Self {
            conn,
            outbound,
            shutdown,
        }
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Spawn the driver; `dial` yields the established halves
    pub(crate) fn start<D>(self, handler: Arc<dyn ConnectionHandler>, dial: D) -> Connection
    where
        D: Future<Output = Result<Halves>> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::spawn(drive(self, handler, dial));
        conn
    }
}

async fn drive<D>(pending: PendingConnection, handler: Arc<dyn ConnectionHandler>, dial: D)
where
    D: Future<Output = Result<Halves>> + Send + 'static,
{
    let PendingConnection {
        conn,
        outbound,
        mut shutdown,
    } = pending;

    let dialed = tokio::select! {
        res = dial => res,
        _ = closed(&mut shutdown) => Err(Error::ConnectionClosed),
    };

    let (mut reader, mut writer) = match dialed {
        Ok(halves) => halves,
        Err(e) => {
            warn!(conn = conn.id(), peer = %conn.remote(), error = %e, "connection failed");
            conn.set_state(ConnectionState::Closed);
            handler.on_error(&conn, &e).await;
            return;
        }
    };

    if !conn.open() {
        debug!(conn = conn.id(), "closed while dialing");
        let _ = writer.close().await;
        return;
    }

    info!(conn = conn.id(), peer = %conn.remote(), "connection open");
    tokio::spawn(write_loop(conn.id(), writer, outbound, shutdown.clone()));
    handler.on_open(&conn).await;

    loop {
        let frame = tokio::select! {
            frame = reader.receive() => frame,
            _ = closed(&mut shutdown) => break,
        };

        match frame {
            Ok(bytes) => handler.on_data(&conn, bytes).await,
            Err(Error::ConnectionClosed) => break,
            Err(e) => {
                warn!(conn = conn.id(), error = %e, "receive failed");
                handler.on_error(&conn, &e).await;
                break;
            }
        }
    }

    // Stops the writer too once it has flushed its queue.
    conn.close();
    info!(conn = conn.id(), peer = %conn.remote(), "connection closed");
    handler.on_close(&conn).await;
}

/// Resolves once the shutdown flag is raised or its sender is gone
pub(crate) async fn closed(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}

async fn write_loop(
    conn_id: u64,
    mut writer: Box<dyn FrameWriter>,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let frame = tokio::select! {
            biased;
            frame = outbound.recv() => frame,
            _ = closed(&mut shutdown) => None,
        };

        let Some(frame) = frame else {
            break;
        };

        if let Err(e) = writer.send(&frame).await {
            warn!(conn = conn_id, error = %e, "send failed, dropping connection writer");
            return;
        }
    }

    while let Ok(frame) = outbound.try_recv() {
        if writer.send(&frame).await.is_err() {
            break;
        }
    }

    if let Err(e) = writer.close().await {
        debug!(conn = conn_id, error = %e, "close failed");
    }
}
