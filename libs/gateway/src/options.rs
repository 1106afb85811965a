use std::time::Duration;

use courier_fabric::PeerId;

/// What to do with a frame that does not decode as a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Answer with a 500 response addressed to the sentinel (empty) id
    #[default]
    Reply,
    /// Log and drop the frame
    Drop,
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Id to listen under; a random UUID when unset
    pub peer_id: Option<PeerId>,
    /// Upstream TCP connect timeout
    pub connect_timeout: Duration,
    /// TCP keep-alive interval for upstream connections
    pub keep_alive: Duration,
    pub tls_handshake_timeout: Duration,
    /// Wait for upstream response headers
    pub response_header_timeout: Duration,
    /// Overall upstream call timeout, body included
    pub client_timeout: Duration,
    /// Idle upstream connections kept per host
    pub max_idle_connections: usize,
    /// Largest upstream response body relayed
    pub max_body_bytes: u64,
    pub malformed_policy: MalformedPolicy,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            peer_id: None,
            connect_timeout: Duration::from_secs(10),
            keep_alive: Duration::from_secs(10),
            tls_handshake_timeout: Duration::from_secs(2),
            response_header_timeout: Duration::from_secs(10),
            client_timeout: Duration::from_secs(10),
            max_idle_connections: 10,
            max_body_bytes: 10 * 1024 * 1024,
            malformed_policy: MalformedPolicy::Reply,
        }
    }
}

impl GatewayOptions {
    pub fn peer_id(mut self, id: impl Into<PeerId>) -> Self {
        self.peer_id = Some(id.into());
        self
    }

    pub fn max_body_bytes(mut self, bytes: u64) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    pub fn malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.malformed_policy = policy;
        self
    }
}
