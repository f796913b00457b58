use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use superipc_core::{CallId, Envelope, ProtocolViolation};

use crate::error::BridgeError;

/// Handle identifying one attached listener.
pub type ListenerId = u64;

/// Callback receiving every envelope pushed onto a reply stream.
///
/// Returning a [`ProtocolViolation`] aborts the delivery loop that invoked
/// the listener and surfaces as [`BridgeError::ProtocolViolation`].
pub type Listener = Box<dyn FnMut(&Envelope) -> Result<(), ProtocolViolation> + Send>;

/// The host primitives a caller needs from the privileged side.
pub trait Bridge: Send + Sync {
    /// Run `channel` and return the envelope answering it.
    ///
    /// Reply stream envelopes emitted while the backend handles the call are
    /// delivered to listeners before this returns.
    fn invoke(
        &self,
        channel: &str,
        args: Option<Value>,
        call_id: Option<CallId>,
    ) -> Result<Envelope, BridgeError>;

    /// Attach a listener to a reply stream.
    fn on(&self, stream: &str, listener: Listener) -> ListenerId;

    /// Detach a listener. Returns false if it was not attached.
    fn remove_listener(&self, stream: &str, id: ListenerId) -> bool;
}

/// Listener bookkeeping shared by bridge implementations.
///
/// Listeners run with the table locked, so they must not attach or detach
/// listeners from inside the callback.
#[derive(Default)]
pub struct ListenerTable {
    streams: Mutex<HashMap<String, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, stream: &str, listener: Listener) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        streams
            .entry(stream.to_string())
            .or_default()
            .push((id, listener));
        tracing::debug!(stream, listener = id, "listener attached");
        id
    }

    pub fn remove(&self, stream: &str, id: ListenerId) -> bool {
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(listeners) = streams.get_mut(stream) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            streams.remove(stream);
        }
        if removed {
            tracing::debug!(stream, listener = id, "listener detached");
        }
        removed
    }

    /// Hand `envelope` to every listener of `stream` in attach order.
    ///
    /// Every listener sees the envelope; the first violation reported is
    /// returned.
    pub fn dispatch(&self, stream: &str, envelope: &Envelope) -> Result<usize, ProtocolViolation> {
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(listeners) = streams.get_mut(stream) else {
            tracing::debug!(stream, "no listener for reply stream envelope");
            return Ok(0);
        };

        let mut violation = None;
        for (_, listener) in listeners.iter_mut() {
            if let Err(err) = listener(envelope) {
                violation.get_or_insert(err);
            }
        }
        match violation {
            Some(err) => Err(err),
            None => Ok(listeners.len()),
        }
    }

    /// Number of listeners attached to `stream`.
    pub fn count(&self, stream: &str) -> usize {
        let streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        streams.get(stream).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for ListenerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<&str, usize> = streams
            .iter()
            .map(|(stream, listeners)| (stream.as_str(), listeners.len()))
            .collect();
        f.debug_struct("ListenerTable").field("streams", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use superipc_core::ResultMode;

    use super::*;

    fn recorder(seen: Arc<Mutex<Vec<Envelope>>>) -> Listener {
        Box::new(move |envelope| {
            seen.lock().unwrap().push(envelope.clone());
            Ok(())
        })
    }

    #[test]
    fn dispatches_only_to_matching_stream() {
        let table = ListenerTable::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        table.add("count-ASYNC_REPLY", recorder(Arc::clone(&seen)));

        let envelope = Envelope::content(ResultMode::Progress, "1", Some(1));
        assert_eq!(table.dispatch("count-ASYNC_REPLY", &envelope).unwrap(), 1);
        assert_eq!(table.dispatch("other-ASYNC_REPLY", &envelope).unwrap(), 0);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let table = ListenerTable::new();
        let id = table.add("s", Box::new(|_| Ok(())));
        assert_eq!(table.count("s"), 1);
        assert!(table.remove("s", id));
        assert!(!table.remove("s", id));
        assert!(!table.remove("never", id));
        assert_eq!(table.count("s"), 0);
    }

    #[test]
    fn violation_still_reaches_other_listeners() {
        let table = ListenerTable::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        table.add(
            "s",
            Box::new(|envelope| {
                Err(ProtocolViolation {
                    call_id: envelope.call_id.unwrap_or_default(),
                    result_mode: envelope.result_mode,
                })
            }),
        );
        table.add("s", recorder(Arc::clone(&seen)));

        let err = table
            .dispatch("s", &Envelope::empty_complete(Some(4)))
            .unwrap_err();
        assert_eq!(err.call_id, 4);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
