use thiserror::Error;

/// Errors returned to callers of the client
///
/// Upstream HTTP failures are not errors here: they arrive as ordinary
/// responses, tunnel-side failures included (status 500).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Duplicated message id {0}")]
    DuplicateId(String),

    #[error("Peer connection is not available")]
    ConnectionUnavailable,

    #[error("Client closed while the call was pending")]
    Closed,

    #[error("Timed out waiting for response")]
    Timeout,

    #[error("Timed out connecting to gateway")]
    ConnectTimeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Codec error: {0}")]
    Codec(#[from] courier_core::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
