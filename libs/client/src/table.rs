//! Correlation of in-flight requests with their responses.
//!
//! An id is in the table exactly while a caller waits for it. Inserts,
//! lookups and removals all go through one lock; matching is by key, so
//! the cost of a response does not grow with the number of pending calls.

use std::collections::HashMap;

use courier_core::message::Response;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::ClientError;

/// Receiving end of a registered call
pub type Completion = oneshot::Receiver<Result<Response, ClientError>>;

/// One outstanding call; the sender is consumed when the call completes
struct PendingCall {
    done: oneshot::Sender<Result<Response, ClientError>>,
}

#[derive(Default)]
struct State {
    pending: HashMap<String, PendingCall>,
    closed: bool,
}

#[derive(Default)]
pub struct CorrelationTable {
    state: Mutex<State>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call under `id`
    ///
    /// An existing entry is never overwritten.
    pub fn register(&self, id: &str) -> Result<Completion, ClientError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ClientError::Closed);
        }
        if state.pending.contains_key(id) {
            return Err(ClientError::DuplicateId(id.to_string()));
        }

        let (done, completion) = oneshot::channel();
        state.pending.insert(id.to_string(), PendingCall { done });
        Ok(completion)
    }

    /// Complete the call `res` answers. Returns false for unknown ids.
    pub fn resolve(&self, res: Response) -> bool {
        // Removed before completing, so a second response for the id misses.
        let Some(call) = self.state.lock().pending.remove(&res.id) else {
            return false;
        };

        let id = res.id.clone();
        if call.done.send(Ok(res)).is_err() {
            debug!(req_id = %id, "caller went away before its response");
        }
        true
    }

    /// Forget a call without completing it
    pub fn cancel(&self, id: &str) -> bool {
        self.state.lock().pending.remove(id).is_some()
    }

    /// Fail every pending call with `Closed` and refuse new ones
    ///
    /// Returns how many calls were released.
    pub fn close(&self) -> usize {
        let drained: Vec<_> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.pending.drain().collect()
        };

        let released = drained.len();
        for (_, call) in drained {
            let _ = call.done.send(Err(ClientError::Closed));
        }
        released
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
