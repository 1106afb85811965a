use std::sync::Arc;

use courier_core::message::{decode_request, encode_response, Response, SENTINEL_ID};
use courier_fabric::{
    ChannelProvider, Connection, ConnectionAcceptor, ConnectionHandler, Listener, PeerId,
};
use tracing::{debug, error, info, warn};

use crate::error::{GatewayError, Result};
use crate::http::Executor;
use crate::options::{GatewayOptions, MalformedPolicy};

/// Serves tunnelled HTTP requests arriving over a channel provider
///
/// Stateless across messages: every inbound frame is handled on its own task
/// and answered on the connection that delivered it.
pub struct Gateway {
    listener: Listener,
}

impl Gateway {
    /// Open the gateway peer and start accepting connections
    pub async fn bind<P: ChannelProvider>(provider: &P, options: GatewayOptions) -> Result<Self> {
        let id = options
            .peer_id
            .clone()
            .unwrap_or_else(|| PeerId::new(uuid::Uuid::new_v4().to_string()));

        let pipeline = Arc::new(Pipeline {
            executor: Executor::new(&options)?,
            malformed_policy: options.malformed_policy,
        });
        let listener = provider
            .listen(&id, Arc::new(Acceptor { pipeline }))
            .await?;

        info!(id = %listener.local_id(), "gateway listening");
        Ok(Self { listener })
    }

    /// Id clients connect to
    pub fn id(&self) -> &PeerId {
        self.listener.local_id()
    }

    /// Stop accepting and drop every open connection
    pub async fn close(self) {
        let id = self.listener.local_id().clone();
        self.listener.close().await;
        info!(id = %id, "gateway closed");
    }
}

struct Acceptor {
    pipeline: Arc<Pipeline>,
}

impl ConnectionAcceptor for Acceptor {
    fn on_connection(&self, conn: &Connection) -> Arc<dyn ConnectionHandler> {
        debug!(conn = conn.id(), peer = %conn.remote(), "inbound connection");
        Arc::new(RequestHandler {
            pipeline: self.pipeline.clone(),
        })
    }

    fn on_error(&self, error: &courier_fabric::Error) {
        error!(error = %error, "peer error");
    }
}

struct RequestHandler {
    pipeline: Arc<Pipeline>,
}

#[async_trait::async_trait]
impl ConnectionHandler for RequestHandler {
    async fn on_data(&self, conn: &Connection, bytes: Vec<u8>) {
        let pipeline = self.pipeline.clone();
        let conn = conn.clone();
        tokio::spawn(async move {
            if let Some(res) = pipeline.handle(&bytes).await {
                send_response(&conn, &res);
            }
        });
    }

    async fn on_error(&self, conn: &Connection, error: &courier_fabric::Error) {
        warn!(conn = conn.id(), error = %error, "connection error");
    }
}

/// Decode, execute, answer
pub(crate) struct Pipeline {
    executor: Executor,
    malformed_policy: MalformedPolicy,
}

impl Pipeline {
    /// The response for one inbound frame, if any is due
    pub(crate) async fn handle(&self, bytes: &[u8]) -> Option<Response> {
        let req = match decode_request(bytes) {
            Ok(req) => req,
            Err(e) => {
                let err = GatewayError::from(e);
                error!(len = bytes.len(), error = %err, "undecodable request");
                return match self.malformed_policy {
                    MalformedPolicy::Reply => Some(err.to_response(SENTINEL_ID)),
                    MalformedPolicy::Drop => None,
                };
            }
        };

        debug!(req_id = %req.id, method = %req.method, url = %req.url, "received request");
        let res = self.executor.execute(&req).await;
        debug!(req_id = %res.id, status = res.status, "request done");
        Some(res)
    }
}

/// Fire and forget; failures are logged only
fn send_response(conn: &Connection, res: &Response) {
    let bytes = match encode_response(res) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(req_id = %res.id, error = %e, "failed to encode response");
            return;
        }
    };

    if let Err(e) = conn.send(bytes) {
        error!(req_id = %res.id, conn = conn.id(), error = %e, "failed to send response");
    }
}
