//! Courier Fabric - Channel provider layer
//!
//! Provides the connection contract the gateway and client are written
//! against: named peers, connections with typed event callbacks, and
//! fire-and-forget message sends. Two providers ship with it: TCP (peer ids
//! are socket addresses) and an in-process memory hub (peer ids are names).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use courier_fabric::{
//!     ChannelProvider, Connection, ConnectionAcceptor, ConnectionHandler, MemoryProvider, PeerId,
//! };
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl ConnectionHandler for Echo {
//!     async fn on_data(&self, conn: &Connection, bytes: Vec<u8>) {
//!         let _ = conn.send(bytes);
//!     }
//! }
//!
//! impl ConnectionAcceptor for Echo {
//!     fn on_connection(&self, _conn: &Connection) -> Arc<dyn ConnectionHandler> {
//!         Arc::new(Echo)
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = MemoryProvider::new();
//! let _listener = provider.listen(&PeerId::new("echo"), Arc::new(Echo)).await?;
//! let _conn = provider.connect(&PeerId::new("echo"), Arc::new(Echo));
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod provider;
pub mod transport;

// Re-exports for convenience
pub use connection::{Connection, ConnectionAcceptor, ConnectionHandler, ConnectionState, PeerId};
pub use error::{Error, Result};
pub use provider::{ChannelProvider, Listener, MemoryProvider, TcpProvider};
