use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::connection::{Connection, ConnectionAcceptor, ConnectionHandler, PeerId, PendingConnection};
use crate::error::{Error, Result};
use crate::provider::{ChannelProvider, Listener};
use crate::transport::{MemoryTransport, MemoryTransportListener, Transport};

const DEFAULT_PIPE_BUFFER: usize = 64 * 1024;

type Registry = Arc<Mutex<HashMap<PeerId, mpsc::UnboundedSender<MemoryTransport>>>>;

/// In-process channel provider; peers are registered by name
///
/// Clones share one registry, so a gateway and its clients must be given
/// clones of the same provider.
#[derive(Clone)]
pub struct MemoryProvider {
    peers: Registry,
    next_anonymous: Arc<AtomicU64>,
    buffer: usize,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self {
            peers: Arc::new(Mutex::new(HashMap::new())),
            next_anonymous: Arc::new(AtomicU64::new(1)),
            buffer: DEFAULT_PIPE_BUFFER,
        }
    }

    /// Set the pipe buffer size in bytes
    pub fn buffer(mut self, bytes: usize) -> Self {
        self.buffer = bytes;
        self
    }

    /// Whether a peer is listening under `id`
    pub fn is_listening(&self, id: &PeerId) -> bool {
        self.peers.lock().contains_key(id)
    }
}

#[async_trait::async_trait]
impl ChannelProvider for MemoryProvider {
    async fn listen(
        &self,
        id: &PeerId,
        acceptor: Arc<dyn ConnectionAcceptor>,
    ) -> Result<Listener> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut peers = self.peers.lock();
            if peers.contains_key(id) {
                return Err(Error::PeerIdTaken(id.to_string()));
            }
            peers.insert(id.clone(), tx);
        }

        let peers = self.peers.clone();
        let name = id.clone();
        let listener = MemoryTransportListener::new(id.clone(), rx);
        Ok(Listener::spawn(listener, acceptor, move || {
            peers.lock().remove(&name);
        }))
    }

    fn connect(&self, target: &PeerId, handler: Arc<dyn ConnectionHandler>) -> Connection {
        let pending = PendingConnection::new(target.clone());
        let local = PeerId::new(format!(
            "memory-{}",
            self.next_anonymous.fetch_add(1, Ordering::Relaxed)
        ));
        let target = target.clone();
        let peers = self.peers.clone();
        let buffer = self.buffer;

        pending.start(handler, async move {
            let listener = peers
                .lock()
                .get(&target)
                .cloned()
                .ok_or_else(|| Error::PeerNotFound(target.to_string()))?;

            let (ours, theirs) = MemoryTransport::pair(local, target.clone(), buffer);
            listener
                .send(theirs)
                .map_err(|_| Error::PeerNotFound(target.to_string()))?;
            Ok(ours.into_split())
        })
    }
}
