use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use superipc_backend::{ChannelRegistry, MemorySink};
use superipc_client::{Bridge, BridgeError, Listener, ListenerId, ListenerTable};
use superipc_core::{CallId, Envelope};

/// In-process bridge dispatching straight into a [`ChannelRegistry`].
///
/// Envelopes a handler emits are queued and handed to listeners in emission
/// order before [`Bridge::invoke`] returns. After [`LocalBridge::disconnect`]
/// further emissions are dropped and invocations fail with
/// [`BridgeError::DestinationGone`].
pub struct LocalBridge {
    registry: Arc<ChannelRegistry>,
    sink: Arc<MemorySink>,
    listeners: ListenerTable,
    serial: Mutex<()>,
}

impl LocalBridge {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self::with_sink(registry, Arc::new(MemorySink::new()))
    }

    /// Use an existing sink, e.g. one a handler can close mid-call.
    pub fn with_sink(registry: Arc<ChannelRegistry>, sink: Arc<MemorySink>) -> Self {
        Self {
            registry,
            sink,
            listeners: ListenerTable::new(),
            serial: Mutex::new(()),
        }
    }

    /// Tear down the receiving end.
    pub fn disconnect(&self) {
        tracing::debug!("local bridge disconnected");
        self.sink.close();
    }

    pub fn is_connected(&self) -> bool {
        !self.sink.is_closed()
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn listeners(&self) -> &ListenerTable {
        &self.listeners
    }
}

impl Bridge for LocalBridge {
    fn invoke(
        &self,
        channel: &str,
        args: Option<Value>,
        call_id: Option<CallId>,
    ) -> Result<Envelope, BridgeError> {
        if self.sink.is_closed() {
            return Err(BridgeError::DestinationGone);
        }

        // One invocation at a time keeps each call's events contiguous.
        let _serial = self.serial.lock().unwrap_or_else(PoisonError::into_inner);
        let answer = self.registry.dispatch(channel, args, call_id, self.sink.as_ref());

        let mut violation = None;
        for (stream, envelope) in self.sink.drain() {
            if let Err(err) = self.listeners.dispatch(&stream, &envelope) {
                violation.get_or_insert(err);
            }
        }

        let envelope = answer.map_err(|err| BridgeError::Rejected {
            code: err.code().to_string(),
            reason: err.to_string(),
        })?;
        match violation {
            Some(err) => Err(err.into()),
            None => Ok(envelope),
        }
    }

    fn on(&self, stream: &str, listener: Listener) -> ListenerId {
        self.listeners.add(stream, listener)
    }

    fn remove_listener(&self, stream: &str, id: ListenerId) -> bool {
        self.listeners.remove(stream, id)
    }
}

impl std::fmt::Debug for LocalBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBridge")
            .field("registry", &self.registry)
            .field("listeners", &self.listeners)
            .field("connected", &self.is_connected())
            .finish()
    }
}
