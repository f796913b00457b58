use std::sync::Arc;

use serde_json::Value;
use superipc_core::{AsyncApi, CallId, CallIdAllocator, Envelope, ProtocolConfig, SyncApi};

use crate::async_call::AsyncCall;
use crate::bridge::Bridge;
use crate::demux::ReplyDemultiplexer;
use crate::error::{BridgeError, Result};
use crate::sync_call::{self, SyncCall, SyncOutcome};

/// Entry point for the caller side: one injected bridge plus the call id
/// allocator shared by every call site created from it.
pub struct Client<B: Bridge + ?Sized> {
    bridge: Arc<B>,
    call_ids: Arc<CallIdAllocator>,
}

impl<B: Bridge + ?Sized> Client<B> {
    pub fn new(bridge: Arc<B>) -> Self {
        Self::with_config(bridge, &ProtocolConfig::default())
    }

    pub fn with_config(bridge: Arc<B>, config: &ProtocolConfig) -> Self {
        Self {
            bridge,
            call_ids: Arc::new(CallIdAllocator::with_config(config)),
        }
    }

    /// Call site for a synchronous channel.
    pub fn sync_call<C: SyncApi>(&self) -> SyncCall<C, B> {
        SyncCall::new(Arc::clone(&self.bridge))
    }

    /// Call site for an asynchronous channel.
    pub fn async_call<C: AsyncApi>(&self) -> AsyncCall<C, B> {
        AsyncCall::new(Arc::clone(&self.bridge), Arc::clone(&self.call_ids))
    }

    /// Call site for an asynchronous channel with observers attached.
    pub fn async_call_with<C: AsyncApi>(&self, demux: ReplyDemultiplexer<C>) -> AsyncCall<C, B> {
        AsyncCall::with_demultiplexer(Arc::clone(&self.bridge), Arc::clone(&self.call_ids), demux)
    }

    /// Invoke a synchronous channel once without keeping state.
    pub fn call<C: SyncApi>(&self, props: &C::Props) -> Result<SyncOutcome<C::Output>> {
        sync_call::call::<C, B>(&self.bridge, props)
    }

    /// Untyped invocation, for channels only known at runtime.
    pub fn invoke_raw(
        &self,
        channel: &str,
        args: Option<Value>,
        call_id: Option<CallId>,
    ) -> std::result::Result<Envelope, BridgeError> {
        self.bridge.invoke(channel, args, call_id)
    }

    pub fn bridge(&self) -> &Arc<B> {
        &self.bridge
    }

    pub fn call_ids(&self) -> &Arc<CallIdAllocator> {
        &self.call_ids
    }
}

impl<B: Bridge + ?Sized> Clone for Client<B> {
    fn clone(&self) -> Self {
        Self {
            bridge: Arc::clone(&self.bridge),
            call_ids: Arc::clone(&self.call_ids),
        }
    }
}

impl<B: Bridge + ?Sized> std::fmt::Debug for Client<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("call_ids", &self.call_ids)
            .finish_non_exhaustive()
    }
}
