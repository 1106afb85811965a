use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection is not open")]
    NotOpen,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    #[error("Peer id already taken: {0}")]
    PeerIdTaken(String),

    #[error("Invalid peer id: {0}")]
    InvalidPeerId(String),

    #[error("{0} timeout exceeded")]
    Timeout(&'static str),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
