//! Wire message model shared by the gateway and the client.
//!
//! A single frame carries one [`Message`]. Requests travel client → gateway,
//! responses travel back; the `id` field is the only link between them.

use serde::{Deserialize, Serialize};

use crate::codec::{BincodeCodec, Codec};
use crate::error::{Error, Result};

/// Id used for responses whose request could not be decoded.
pub const SENTINEL_ID: &str = "";

/// One header name with all of its values, in order.
///
/// Several `Header` entries may share a key; consumers merge them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub values: Vec<String>,
}

impl Header {
    pub fn new(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }

    pub fn single(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, vec![value.into()])
    }
}

/// An HTTP request as it crosses the channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    pub url: String,
    /// Protocol override such as `HTTP/1.1`; empty means the gateway default.
    pub protocol: String,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
}

/// An HTTP response as it crosses the channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
}

impl Response {
    /// Build a tunnel-side error response carrying a diagnostic body.
    pub fn error(id: impl Into<String>, status: u16, status_text: &str, msg: &str) -> Self {
        Self {
            id: id.into(),
            status,
            status_text: status_text.to_string(),
            headers: Vec::new(),
            body: msg.as_bytes().to_vec(),
        }
    }

    /// Iterate every `(key, value)` pair in wire order.
    pub fn header_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        header_pairs(&self.headers)
    }

    /// All values for `key` (case-insensitive), merged across repeated entries.
    pub fn header_values(&self, key: &str) -> Vec<&str> {
        self.header_pairs()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
            .collect()
    }
}

impl Request {
    /// Iterate every `(key, value)` pair in wire order.
    pub fn header_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        header_pairs(&self.headers)
    }
}

fn header_pairs(headers: &[Header]) -> impl Iterator<Item = (&str, &str)> {
    headers.iter().flat_map(|h| {
        h.values
            .iter()
            .map(move |v| (h.key.as_str(), v.as_str()))
    })
}

/// Envelope for everything sent over a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn id(&self) -> &str {
        match self {
            Message::Request(req) => &req.id,
            Message::Response(res) => &res.id,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        BincodeCodec.encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        BincodeCodec.decode(bytes)
    }
}

impl From<Request> for Message {
    fn from(req: Request) -> Self {
        Message::Request(req)
    }
}

impl From<Response> for Message {
    fn from(res: Response) -> Self {
        Message::Response(res)
    }
}

/// Encode a request into a frame.
pub fn encode_request(req: &Request) -> Result<Vec<u8>> {
    BincodeCodec.encode(&MessageRef::Request(req))
}

/// Encode a response into a frame.
pub fn encode_response(res: &Response) -> Result<Vec<u8>> {
    BincodeCodec.encode(&MessageRef::Response(res))
}

/// Decode a frame that must hold a request.
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    match Message::decode(bytes)? {
        Message::Request(req) => Ok(req),
        other => Err(Error::malformed(format!(
            "expected request, got response {}",
            other.id()
        ))),
    }
}

/// Decode a frame that must hold a response.
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    match Message::decode(bytes)? {
        Message::Response(res) => Ok(res),
        other => Err(Error::malformed(format!(
            "expected response, got request {}",
            other.id()
        ))),
    }
}

// Borrowing twin of `Message`; serde encodes both identically.
#[derive(Serialize)]
#[serde(rename = "Message")]
enum MessageRef<'a> {
    Request(&'a Request),
    Response(&'a Response),
}
