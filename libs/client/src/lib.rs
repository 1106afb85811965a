//! Courier Client - HTTP calls tunnelled through a gateway
//!
//! The client turns ordinary HTTP requests into channel messages, sends them
//! to a gateway and resolves each call when the response carrying its id
//! comes back. Responses may arrive in any order; each one completes exactly
//! the call it belongs to.
//!
//! # Example
//!
//! ```no_run
//! use courier_client::{Client, ClientOptions};
//! use courier_fabric::MemoryProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = MemoryProvider::new();
//! let client = Client::connect(&provider, ClientOptions::new("gateway")).await?;
//! let body = client.get("http://localhost:8080/", Default::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod options;
pub mod table;

mod dispatcher;

// Re-exports for convenience
pub use client::Client;
pub use error::{ClientError, Result};
pub use options::ClientOptions;
pub use table::CorrelationTable;
