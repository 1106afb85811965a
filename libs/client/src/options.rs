use std::time::Duration;

use courier_fabric::PeerId;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Label for this client in log lines
    ///
    /// Never sent to the provider or the gateway; the provider assigns the
    /// connection's own identity.
    pub peer_id: PeerId,
    /// Gateway to connect to
    pub gateway: PeerId,
    /// Wait for the connection to open
    pub connect_timeout: Duration,
    /// Wait for each response; `None` waits forever
    pub call_timeout: Option<Duration>,
}

impl ClientOptions {
    pub fn new(gateway: impl Into<PeerId>) -> Self {
        Self {
            peer_id: PeerId::new(uuid::Uuid::new_v4().to_string()),
            gateway: gateway.into(),
            connect_timeout: Duration::from_secs(2),
            call_timeout: None,
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
}
