use crate::connection::PeerId;
use crate::error::Result;

pub mod framed;
pub mod memory;
pub mod tcp;

pub use self::framed::{FramedReader, FramedWriter, MAX_FRAME_LEN};
pub use self::memory::{MemoryTransport, MemoryTransportListener};
pub use self::tcp::{TcpTransport, TcpTransportBuilder, TcpTransportListener};

/// Receiving half of a connection
#[async_trait::async_trait]
pub trait FrameReader: Send {
    /// Receive the next frame
    async fn receive(&mut self) -> Result<Vec<u8>>;
}

/// Sending half of a connection
#[async_trait::async_trait]
pub trait FrameWriter: Send {
    /// Send one frame
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Close the sending direction
    async fn close(&mut self) -> Result<()>;
}

/// Boxed reading and writing halves of one established connection
pub type Halves = (Box<dyn FrameReader>, Box<dyn FrameWriter>);

/// Transport trait for an established, message-framed connection
///
/// Each transport instance represents a single connection. It is split
/// into halves so frames can be read and written concurrently.
pub trait Transport: Send + 'static {
    /// Id of the peer on the other end
    fn remote(&self) -> PeerId;

    /// Split into independently owned halves
    fn into_split(self) -> Halves;
}

/// Listener producing inbound transports
#[async_trait::async_trait]
pub trait TransportListener: Send + Sync + 'static {
    type Transport: Transport;

    /// Accept an incoming connection
    async fn accept(&self) -> Result<Self::Transport>;

    /// Id other peers use to reach this listener
    fn local_id(&self) -> PeerId;
}
