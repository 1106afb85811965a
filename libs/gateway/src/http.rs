//! Outbound HTTP execution for tunnelled requests.

use std::time::Duration;

use courier_core::message::{Header, Request, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect, Client, Method, Url, Version};

use crate::error::{GatewayError, Result};
use crate::options::GatewayOptions;

/// Runs requests against their real destination
///
/// Holds one pooled HTTP client shared by every connection.
#[derive(Debug, Clone)]
pub struct Executor {
    client: Client,
    response_header_timeout: Duration,
    max_body_bytes: u64,
}

impl Executor {
    pub fn new(options: &GatewayOptions) -> Result<Self> {
        // reqwest's connect phase includes the TLS handshake.
        let client = Client::builder()
            .connect_timeout(options.connect_timeout + options.tls_handshake_timeout)
            .tcp_keepalive(options.keep_alive)
            .timeout(options.client_timeout)
            .pool_max_idle_per_host(options.max_idle_connections)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            response_header_timeout: options.response_header_timeout,
            max_body_bytes: options.max_body_bytes,
        })
    }

    /// Execute `req`; failures come back as 500 responses
    pub async fn execute(&self, req: &Request) -> Response {
        match self.try_execute(req).await {
            Ok(res) => res,
            Err(e) => {
                tracing::error!(req_id = %req.id, url = %req.url, error = %e, "request failed");
                e.to_response(&req.id)
            }
        }
    }

    pub async fn try_execute(&self, req: &Request) -> std::result::Result<Response, GatewayError> {
        let outbound = build_request(&self.client, req)?;

        let upstream = tokio::time::timeout(
            self.response_header_timeout,
            self.client.execute(outbound),
        )
        .await
        .map_err(|_| GatewayError::ResponseHeaderTimeout(self.response_header_timeout))?
        .map_err(|e| GatewayError::execution(&e))?;

        let status = upstream.status();
        let headers = collect_headers(upstream.headers());
        // Dropping `upstream` on any early return releases its connection.
        let body = read_body(upstream, self.max_body_bytes).await?;

        Ok(Response {
            id: req.id.clone(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

/// Translate a wire request into an outbound HTTP request
///
/// Every header value is appended, so repeated keys all survive.
pub fn build_request(client: &Client, req: &Request) -> std::result::Result<reqwest::Request, GatewayError> {
    let method = Method::from_bytes(req.method.as_bytes())
        .map_err(|e| GatewayError::InvalidRequest(format!("method {:?}: {e}", req.method)))?;
    let url = Url::parse(&req.url)
        .map_err(|e| GatewayError::InvalidRequest(format!("url {:?}: {e}", req.url)))?;
    let version = if req.protocol.is_empty() {
        None
    } else {
        forced_version(parse_version(&req.protocol)?, &url)
    };

    let mut headers = HeaderMap::new();
    for (key, value) in req.header_pairs() {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| GatewayError::InvalidRequest(format!("header {key:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| GatewayError::InvalidRequest(format!("header {key:?} value: {e}")))?;
        headers.append(name, value);
    }

    let mut builder = client.request(method, url).headers(headers);
    if !req.body.is_empty() {
        builder = builder.body(req.body.clone());
    }
    if let Some(version) = version {
        builder = builder.version(version);
    }

    builder
        .build()
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))
}

fn parse_version(protocol: &str) -> std::result::Result<Version, GatewayError> {
    match protocol.to_ascii_uppercase().as_str() {
        "HTTP/0.9" => Ok(Version::HTTP_09),
        "HTTP/1.0" => Ok(Version::HTTP_10),
        "HTTP/1.1" => Ok(Version::HTTP_11),
        "HTTP/2" | "HTTP/2.0" => Ok(Version::HTTP_2),
        "HTTP/3" | "HTTP/3.0" => Ok(Version::HTTP_3),
        _ => Err(GatewayError::InvalidRequest(format!(
            "unknown protocol {protocol:?}"
        ))),
    }
}

/// The version to pin on the outbound request, if any
///
/// HTTP/2 is only negotiable over TLS, and HTTP/0.9 and HTTP/3 are not
/// spoken by the client at all; those stay a label and the client picks.
fn forced_version(version: Version, url: &Url) -> Option<Version> {
    match version {
        Version::HTTP_10 | Version::HTTP_11 => Some(version),
        Version::HTTP_2 if url.scheme() == "https" => Some(version),
        _ => {
            tracing::debug!(?version, url = %url, "protocol not forced, using client default");
            None
        }
    }
}

/// Group upstream headers per name, values in received order
pub fn collect_headers(map: &HeaderMap) -> Vec<Header> {
    map.keys()
        .map(|name| Header {
            key: name.as_str().to_string(),
            values: map
                .get_all(name)
                .iter()
                .map(|v| header_text(name, v))
                .collect(),
        })
        .collect()
}

fn header_text(name: &HeaderName, value: &HeaderValue) -> String {
    match std::str::from_utf8(value.as_bytes()) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let text = String::from_utf8_lossy(value.as_bytes()).into_owned();
            tracing::warn!(header = %name, value = %text, "header value is not UTF-8, replaced lossily");
            text
        }
    }
}

/// Read at most `limit` bytes of body
async fn read_body(
    mut upstream: reqwest::Response,
    limit: u64,
) -> std::result::Result<Vec<u8>, GatewayError> {
    if upstream.content_length().is_some_and(|len| len > limit) {
        return Err(GatewayError::BodyTooLarge { limit });
    }

    let mut body = Vec::new();
    while let Some(chunk) = upstream
        .chunk()
        .await
        .map_err(|e| GatewayError::read_body(&e))?
    {
        if (body.len() + chunk.len()) as u64 > limit {
            return Err(GatewayError::BodyTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
