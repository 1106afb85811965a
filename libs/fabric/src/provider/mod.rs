use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::connection::{
    closed, Connection, ConnectionAcceptor, ConnectionHandler, ConnectionState, PeerId,
    PendingConnection,
};
use crate::error::{Error, Result};
use crate::transport::{Transport, TransportListener};

pub mod memory;
pub mod tcp;

pub use self::memory::MemoryProvider;
pub use self::tcp::TcpProvider;

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Source of connections between named peers
///
/// Everything above this trait talks to peers only through it; the
/// transport underneath (TCP, in-memory, ...) is the provider's business.
#[async_trait::async_trait]
pub trait ChannelProvider: Send + Sync + 'static {
    /// Open a named peer that accepts inbound connections
    async fn listen(&self, id: &PeerId, acceptor: Arc<dyn ConnectionAcceptor>)
        -> Result<Listener>;

    /// Start connecting to `target`
    ///
    /// Returns at once with a connection in the `Connecting` state; the
    /// outcome arrives through `on_open` or `on_error`.
    fn connect(&self, target: &PeerId, handler: Arc<dyn ConnectionHandler>) -> Connection;
}

/// A listening peer; stops accepting when closed or dropped
pub struct Listener {
    local_id: PeerId,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Listener {
    /// Spawn an accept loop over `listener`
    ///
    /// `on_exit` runs once the loop has stopped.
    pub(crate) fn spawn<L, F>(listener: L, acceptor: Arc<dyn ConnectionAcceptor>, on_exit: F) -> Self
    where
        L: TransportListener,
        F: FnOnce() + Send + 'static,
    {
        let local_id = listener.local_id();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            accept_loop(listener, acceptor, shutdown_rx).await;
            on_exit();
        });
        Self {
            local_id,
            shutdown,
            task,
        }
    }

    /// Id other peers connect to
    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    /// Stop accepting and close every connection accepted so far
    pub async fn close(mut self) {
        self.shutdown.send_replace(true);
        let _ = (&mut self.task).await;
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

async fn accept_loop<L: TransportListener>(
    listener: L,
    acceptor: Arc<dyn ConnectionAcceptor>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut accepted: Vec<Connection> = Vec::new();

    loop {
        let incoming = tokio::select! {
            res = listener.accept() => res,
            _ = closed(&mut shutdown) => break,
        };

        match incoming {
            Ok(transport) => {
                accepted.retain(|c| c.state() != ConnectionState::Closed);

                let pending = PendingConnection::new(transport.remote());
                let handler = acceptor.on_connection(pending.connection());
                let conn = pending.start(handler, async move { Ok(transport.into_split()) });
                debug!(conn = conn.id(), peer = %conn.remote(), "accepted connection");
                accepted.push(conn);
            }
            Err(Error::ConnectionClosed) => break,
            Err(e) => {
                error!(local = %listener.local_id(), error = %e, "accept failed");
                acceptor.on_error(&e);
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }

    for conn in accepted {
        conn.close();
    }
    debug!(local = %listener.local_id(), "listener stopped");
}
