use std::sync::Arc;

use courier_core::message::decode_response;
use courier_fabric::{Connection, ConnectionHandler};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::table::CorrelationTable;

/// Outcome of the connection attempt: `Ok` on open, the error text otherwise
pub(crate) type OpenSignal = oneshot::Sender<Result<(), String>>;

/// Routes every inbound frame of a client connection to its waiting call
pub(crate) struct Dispatcher {
    table: Arc<CorrelationTable>,
    opened: Mutex<Option<OpenSignal>>,
}

impl Dispatcher {
    pub(crate) fn new(table: Arc<CorrelationTable>, opened: OpenSignal) -> Self {
        Self {
            table,
            opened: Mutex::new(Some(opened)),
        }
    }

    fn signal(&self, outcome: Result<(), String>) -> bool {
        match self.opened.lock().take() {
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl ConnectionHandler for Dispatcher {
    async fn on_open(&self, conn: &Connection) {
        debug!(conn = conn.id(), gateway = %conn.remote(), "peer connected");
        self.signal(Ok(()));
    }

    async fn on_data(&self, conn: &Connection, bytes: Vec<u8>) {
        let res = match decode_response(&bytes) {
            Ok(res) => res,
            Err(e) => {
                error!(conn = conn.id(), len = bytes.len(), error = %e, "dropping undecodable response");
                return;
            }
        };

        let id = res.id.clone();
        if self.table.resolve(res) {
            debug!(req_id = %id, "response matched");
        } else {
            warn!(req_id = %id, "dropping response for unknown id");
        }
    }

    async fn on_error(&self, conn: &Connection, error: &courier_fabric::Error) {
        if !self.signal(Err(error.to_string())) {
            error!(conn = conn.id(), error = %error, "connection error");
        }
    }

    async fn on_close(&self, conn: &Connection) {
        let released = self.table.close();
        if released > 0 {
            warn!(conn = conn.id(), released, "connection lost with calls pending");
        } else {
            debug!(conn = conn.id(), "connection closed");
        }
    }
}
