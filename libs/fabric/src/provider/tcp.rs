use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::connection::{Connection, ConnectionAcceptor, ConnectionHandler, PeerId, PendingConnection};
use crate::error::{Error, Result};
use crate::provider::{ChannelProvider, Listener};
use crate::transport::{TcpTransport, TcpTransportListener, Transport};

/// Channel provider over TCP; peer ids are socket addresses
#[derive(Debug, Clone, Default)]
pub struct TcpProvider {
    connect_timeout: Option<Duration>,
    send_timeout: Option<Duration>,
}

impl TcpProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the per-frame send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }
}

fn parse_addr(id: &PeerId) -> Result<SocketAddr> {
    id.as_str()
        .parse()
        .map_err(|_| Error::InvalidPeerId(id.to_string()))
}

#[async_trait::async_trait]
impl ChannelProvider for TcpProvider {
    async fn listen(
        &self,
        id: &PeerId,
        acceptor: Arc<dyn ConnectionAcceptor>,
    ) -> Result<Listener> {
        let addr = parse_addr(id)?;
        let listener = TcpTransportListener::bind(addr)
            .await?
            .with_send_timeout(self.send_timeout);
        Ok(Listener::spawn(listener, acceptor, || {}))
    }

    fn connect(&self, target: &PeerId, handler: Arc<dyn ConnectionHandler>) -> Connection {
        let pending = PendingConnection::new(target.clone());
        let builder = TcpTransport::builder()
            .connect_timeout(self.connect_timeout)
            .send_timeout(self.send_timeout);
        let addr = parse_addr(target);

        pending.start(handler, async move {
            let transport = builder.address(addr?).connect().await?;
            Ok(transport.into_split())
        })
    }
}
