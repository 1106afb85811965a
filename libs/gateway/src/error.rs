use std::time::Duration;

use courier_core::message::Response;
use thiserror::Error;

/// Reason reported alongside status 500
const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// Errors raised while setting up a gateway
#[derive(Error, Debug)]
pub enum Error {
    #[error("Fabric error: {0}")]
    Fabric(#[from] courier_fabric::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures while serving one tunnelled request
///
/// None of these reach the channel as transport failures: each one is turned
/// into a 500 response whose body is the display text below.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Failed to parse request: {0}")]
    MalformedMessage(#[from] courier_core::Error),

    #[error("Failed to create HTTP request: {0}")]
    InvalidRequest(String),

    #[error("Failed to send HTTP request: {0}")]
    ExecutionFailure(String),

    #[error("Failed to send HTTP request: no response headers within {0:?}")]
    ResponseHeaderTimeout(Duration),

    #[error("HTTP body is too large: response body exceeds {limit} bytes")]
    BodyTooLarge { limit: u64 },

    #[error("Failed to read HTTP response body: {0}")]
    ReadBody(String),
}

impl GatewayError {
    pub fn status(&self) -> u16 {
        500
    }

    /// The protocol-level response reporting this failure
    pub fn to_response(&self, id: &str) -> Response {
        Response::error(id, self.status(), INTERNAL_SERVER_ERROR, &self.to_string())
    }

    pub(crate) fn execution(err: &reqwest::Error) -> Self {
        Self::ExecutionFailure(describe(err))
    }

    pub(crate) fn read_body(err: &reqwest::Error) -> Self {
        Self::ReadBody(describe(err))
    }
}

/// Flatten an error and its sources into one line
fn describe(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
