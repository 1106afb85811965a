use std::sync::Arc;

use courier_core::message::{encode_request, Header, Request, Response};
use courier_fabric::{ChannelProvider, Connection, PeerId};
use http::{HeaderMap, Method};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{ClientError, Result};
use crate::options::ClientOptions;
use crate::table::{Completion, CorrelationTable};

/// Sends HTTP requests through a gateway and waits for the answers
///
/// Cheap to clone; clones share the connection and the pending calls.
/// Dropping the last clone closes the client.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    options: ClientOptions,
    connection: Connection,
    table: Arc<CorrelationTable>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.table.close();
        self.connection.close();
    }
}

impl Client {
    /// Connect to `options.gateway` and wait for the channel to open
    pub async fn connect<P: ChannelProvider>(provider: &P, options: ClientOptions) -> Result<Self> {
        let table = Arc::new(CorrelationTable::new());
        let (opened_tx, opened) = oneshot::channel();
        let dispatcher = Arc::new(Dispatcher::new(table.clone(), opened_tx));

        let connection = provider.connect(&options.gateway, dispatcher);

        let outcome = match tokio::time::timeout(options.connect_timeout, opened).await {
            Err(_) => Err(ClientError::ConnectTimeout),
            Ok(Err(_)) => Err(ClientError::Connect(
                "connection dropped before opening".to_string(),
            )),
            Ok(Ok(Err(msg))) => Err(ClientError::Connect(msg)),
            Ok(Ok(Ok(()))) => Ok(()),
        };
        if let Err(e) = outcome {
            warn!(gateway = %options.gateway, error = %e, "connect failed");
            connection.close();
            return Err(e);
        }

        info!(client = %options.peer_id, gateway = %options.gateway, "client connected");
        Ok(Self {
            inner: Arc::new(Inner {
                options,
                connection,
                table,
            }),
        })
    }

    /// The log label from [`ClientOptions::peer_id`]
    pub fn id(&self) -> &PeerId {
        &self.inner.options.peer_id
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connection.is_open()
    }

    /// Calls currently waiting for a response
    pub fn pending_calls(&self) -> usize {
        self.inner.table.len()
    }

    /// Send a wire request and wait for its response
    ///
    /// The request gets a fresh id; whatever id it carried is replaced.
    pub async fn round_trip(&self, mut req: Request) -> Result<Response> {
        let inner = &self.inner;
        if !inner.connection.is_open() {
            return Err(ClientError::ConnectionUnavailable);
        }

        req.id = uuid::Uuid::new_v4().to_string();
        let bytes = encode_request(&req)?;

        let call = Registration::new(&inner.table, &req.id)?;
        if let Err(e) = inner.connection.send(bytes) {
            warn!(req_id = %req.id, error = %e, "send failed");
            return Err(ClientError::ConnectionUnavailable);
        }
        debug!(req_id = %req.id, method = %req.method, url = %req.url, "request sent");

        call.wait(inner.options.call_timeout).await
    }

    /// Perform `request` and return the full response
    pub async fn fetch(&self, request: http::Request<Vec<u8>>) -> Result<http::Response<Vec<u8>>> {
        let res = self.round_trip(to_wire(request)).await?;
        to_http(res)
    }

    /// Perform `request` and return the response body
    ///
    /// Any HTTP status counts as success, including 500s produced by the
    /// gateway itself.
    pub async fn send(&self, request: http::Request<Vec<u8>>) -> Result<Vec<u8>> {
        Ok(self.round_trip(to_wire(request)).await?.body)
    }

    /// GET `url`
    pub async fn get(&self, url: &str, headers: HeaderMap) -> Result<Vec<u8>> {
        self.send(build(Method::GET, url, Vec::new(), headers)?).await
    }

    /// POST `body` to `url`
    pub async fn post(&self, url: &str, body: Vec<u8>, headers: HeaderMap) -> Result<Vec<u8>> {
        self.send(build(Method::POST, url, body, headers)?).await
    }

    /// Release every pending call with `Closed` and close the connection
    pub fn close(&self) {
        let released = self.inner.table.close();
        self.inner.connection.close();
        info!(client = %self.inner.options.peer_id, released, "client closed");
    }
}

/// A registered call; leaves the table when dropped
struct Registration<'a> {
    table: &'a CorrelationTable,
    id: String,
    completion: Option<Completion>,
}

impl<'a> Registration<'a> {
    fn new(table: &'a CorrelationTable, id: &str) -> Result<Self> {
        let completion = table.register(id)?;
        Ok(Self {
            table,
            id: id.to_string(),
            completion: Some(completion),
        })
    }

    async fn wait(mut self, timeout: Option<std::time::Duration>) -> Result<Response> {
        let Some(completion) = self.completion.take() else {
            return Err(ClientError::Closed);
        };

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, completion).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(req_id = %self.id, ?limit, "call timed out");
                    return Err(ClientError::Timeout);
                }
            },
            None => completion.await,
        };

        // A dropped sender means the table went away without answering.
        outcome.unwrap_or(Err(ClientError::Closed))
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.table.cancel(&self.id);
    }
}

fn build(method: Method, url: &str, body: Vec<u8>, headers: HeaderMap) -> Result<http::Request<Vec<u8>>> {
    let mut request = http::Request::builder()
        .method(method)
        .uri(url)
        .body(body)
        .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
    *request.headers_mut() = headers;
    Ok(request)
}

fn to_wire(request: http::Request<Vec<u8>>) -> Request {
    let (parts, body) = request.into_parts();
    Request {
        id: String::new(),
        method: parts.method.to_string(),
        url: parts.uri.to_string(),
        protocol: format!("{:?}", parts.version),
        headers: group_headers(&parts.headers),
        body,
    }
}

fn group_headers(map: &HeaderMap) -> Vec<Header> {
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

fn header_text(name: &http::HeaderName, value: &http::HeaderValue) -> String {
    match std::str::from_utf8(value.as_bytes()) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let text = String::from_utf8_lossy(value.as_bytes()).into_owned();
            warn!(header = %name, value = %text, "header value is not UTF-8, replaced lossily");
            text
        }
    }
}

fn to_http(res: Response) -> Result<http::Response<Vec<u8>>> {
    let mut builder = http::Response::builder().status(res.status);
    for (key, value) in res.header_pairs() {
        builder = builder.header(key, value);
    }
    builder
        .body(res.body)
        .map_err(|e| ClientError::InvalidResponse(e.to_string()))
}
