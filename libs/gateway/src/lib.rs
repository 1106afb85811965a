//! Courier Gateway - Executes tunnelled HTTP requests
//!
//! A gateway listens on a channel provider, decodes each inbound request,
//! performs the real HTTP call and sends the response back over the same
//! connection. Failures on the way (undecodable frames, unreachable hosts,
//! oversized bodies) become ordinary 500 responses.
//!
//! # Example
//!
//! ```no_run
//! use courier_fabric::MemoryProvider;
//! use courier_gateway::{Gateway, GatewayOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = MemoryProvider::new();
//! let gateway = Gateway::bind(&provider, GatewayOptions::default().peer_id("gw")).await?;
//! println!("clients connect to {}", gateway.id());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod gateway;
pub mod http;
pub mod options;

// Re-exports for convenience
pub use error::{Error, GatewayError, Result};
pub use gateway::Gateway;
pub use options::{GatewayOptions, MalformedPolicy};
