//! Courier Core - Wire message model
//!
//! Defines the request/response messages tunnelled between a client and a
//! gateway, and the codec that turns them into frames.
//!
//! # Example
//!
//! ```
//! use courier_core::message::{decode_request, encode_request, Header, Request};
//!
//! let req = Request {
//!     id: "1".to_string(),
//!     method: "GET".to_string(),
//!     url: "http://localhost/".to_string(),
//!     headers: vec![Header::single("Accept", "*/*")],
//!     ..Default::default()
//! };
//! let bytes = encode_request(&req).unwrap();
//! assert_eq!(decode_request(&bytes).unwrap(), req);
//! ```

pub mod codec;
pub mod error;
pub mod message;

// Re-exports for convenience
pub use error::{Error, Result};
pub use message::{Header, Message, Request, Response};
