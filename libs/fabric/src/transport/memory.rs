use tokio::io::DuplexStream;
use tokio::sync::{mpsc, Mutex};

use crate::connection::PeerId;
use crate::error::{Error, Result};
use crate::transport::{FramedReader, FramedWriter, Halves, Transport, TransportListener};

/// In-process transport over a duplex pipe, framed like TCP
pub struct MemoryTransport {
    remote: PeerId,
    stream: DuplexStream,
}

impl MemoryTransport {
    /// Create both ends of a pipe. `a` talks to `b_id`, `b` talks to `a_id`.
    pub fn pair(a_id: PeerId, b_id: PeerId, buffer: usize) -> (Self, Self) {
        let (a, b) = tokio::io::duplex(buffer);
        (
            Self {
                remote: b_id,
                stream: a,
            },
            Self {
                remote: a_id,
                stream: b,
            },
        )
    }
}

impl Transport for MemoryTransport {
    fn remote(&self) -> PeerId {
        self.remote.clone()
    }

    fn into_split(self) -> Halves {
        let (read, write) = tokio::io::split(self.stream);
        (
            Box::new(FramedReader::new(read)),
            Box::new(FramedWriter::new(write, None)),
        )
    }
}

/// Receives transports handed over by the memory hub
pub struct MemoryTransportListener {
    id: PeerId,
    incoming: Mutex<mpsc::UnboundedReceiver<MemoryTransport>>,
}

impl MemoryTransportListener {
    pub(crate) fn new(id: PeerId, incoming: mpsc::UnboundedReceiver<MemoryTransport>) -> Self {
        Self {
            id,
            incoming: Mutex::new(incoming),
        }
    }
}

#[async_trait::async_trait]
impl TransportListener for MemoryTransportListener {
    type Transport = MemoryTransport;

    async fn accept(&self) -> Result<Self::Transport> {
        self.incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or(Error::ConnectionClosed)
    }

    fn local_id(&self) -> PeerId {
        self.id.clone()
    }
}
