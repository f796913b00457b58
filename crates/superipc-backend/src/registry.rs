use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use superipc_core::{
    validate_channel_name, AppError, AsyncApi, CallId, CallIdAllocator, Envelope, ProtocolConfig,
    SyncApi,
};

use crate::adapter::{AsyncAdapter, SyncAdapter};
use crate::emitter::Emitter;
use crate::error::{DispatchError, RegistrationError};
use crate::sink::ReplySink;

/// Whether a channel answers directly or through its reply stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Sync,
    Async,
}

enum Handler {
    Sync(SyncAdapter),
    Async(AsyncAdapter),
}

/// Channel-name keyed table of adapters.
///
/// Each name is bound to exactly one adapter for the registry's lifetime.
/// Handlers are statically callable, so the only registration failures are
/// malformed and duplicate names.
pub struct ChannelRegistry {
    handlers: HashMap<String, Handler>,
    call_ids: CallIdAllocator,
    config: ProtocolConfig,
}

impl ChannelRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(ProtocolConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: ProtocolConfig) -> Self {
        Self {
            handlers: HashMap::new(),
            call_ids: CallIdAllocator::with_config(&config),
            config,
        }
    }

    /// Build a registry from separate sync and async handler tables.
    ///
    /// Fails on the first malformed or duplicate name, including a name
    /// present in both tables.
    pub fn from_adapters(
        sync: impl IntoIterator<Item = (String, SyncAdapter)>,
        r#async: impl IntoIterator<Item = (String, AsyncAdapter)>,
    ) -> Result<Self, RegistrationError> {
        let mut registry = Self::new();
        for (name, adapter) in sync {
            registry.register_sync_adapter(name, adapter)?;
        }
        for (name, adapter) in r#async {
            registry.register_async_adapter(name, adapter)?;
        }
        Ok(registry)
    }

    /// Register a handler for a synchronous channel contract.
    pub fn register_sync<A, F>(&mut self, handler: F) -> Result<&mut Self, RegistrationError>
    where
        A: SyncApi,
        F: Fn(A::Props) -> Result<A::Output, AppError> + Send + Sync + 'static,
    {
        self.register_sync_adapter(A::CHANNEL, SyncAdapter::for_api::<A, F>(handler))
    }

    /// Register a handler for an asynchronous channel contract.
    pub fn register_async<A, F>(&mut self, handler: F) -> Result<&mut Self, RegistrationError>
    where
        A: AsyncApi,
        F: Fn(
                A::Props,
                &Emitter<'_, A::Init, A::Progress, A::Complete>,
            ) -> Result<Option<A::Complete>, AppError>
            + Send
            + Sync
            + 'static,
    {
        self.register_async_adapter(A::CHANNEL, AsyncAdapter::for_api::<A, F>(handler))
    }

    /// Register a synchronous handler under a runtime name.
    pub fn register_sync_fn<P, R, F>(
        &mut self,
        name: impl Into<String>,
        handler: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        P: DeserializeOwned,
        R: Serialize,
        F: Fn(P) -> Result<R, AppError> + Send + Sync + 'static,
    {
        self.register_sync_adapter(name, SyncAdapter::new(handler))
    }

    /// Register an asynchronous handler under a runtime name.
    pub fn register_async_fn<P, I, G, C, F>(
        &mut self,
        name: impl Into<String>,
        handler: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        P: DeserializeOwned,
        I: Serialize,
        G: Serialize,
        C: Serialize,
        F: Fn(P, &Emitter<'_, I, G, C>) -> Result<Option<C>, AppError> + Send + Sync + 'static,
    {
        self.register_async_adapter(name, AsyncAdapter::new(handler))
    }

    pub fn register_sync_adapter(
        &mut self,
        name: impl Into<String>,
        adapter: SyncAdapter,
    ) -> Result<&mut Self, RegistrationError> {
        self.insert(name.into(), Handler::Sync(adapter))
    }

    pub fn register_async_adapter(
        &mut self,
        name: impl Into<String>,
        adapter: AsyncAdapter,
    ) -> Result<&mut Self, RegistrationError> {
        self.insert(name.into(), Handler::Async(adapter))
    }

    fn insert(&mut self, name: String, handler: Handler) -> Result<&mut Self, RegistrationError> {
        validate_channel_name(&name).map_err(|source| RegistrationError::InvalidName {
            name: name.clone(),
            source,
        })?;
        if self.handlers.contains_key(&name) {
            return Err(RegistrationError::Duplicate(name));
        }

        let kind = match handler {
            Handler::Sync(_) => ChannelKind::Sync,
            Handler::Async(_) => ChannelKind::Async,
        };
        tracing::debug!(channel = %name, ?kind, "registered channel");
        self.handlers.insert(name, handler);
        Ok(self)
    }

    /// Run `channel` and return the envelope answering the invocation.
    ///
    /// Sync channels answer with their single `COMPLETE` envelope.
    /// Async channels emit through `sink` and answer with an acknowledgement
    /// carrying the call id; a missing call id is allocated here.
    pub fn dispatch(
        &self,
        channel: &str,
        args: Option<Value>,
        call_id: Option<CallId>,
        sink: &dyn ReplySink,
    ) -> Result<Envelope, DispatchError> {
        let handler = self
            .handlers
            .get(channel)
            .ok_or_else(|| DispatchError::UnknownChannel(channel.to_string()))?;

        match handler {
            Handler::Sync(adapter) => {
                tracing::debug!(channel, "dispatching sync call");
                Ok(adapter.call(channel, args))
            }
            Handler::Async(adapter) => {
                let (call_id, allocated) = self.resolve_call_id(channel, call_id)?;
                tracing::debug!(channel, call_id, "dispatching async call");
                let ack = adapter.call(channel, args, call_id, sink);
                if allocated {
                    self.call_ids.release(call_id);
                }
                Ok(ack)
            }
        }
    }

    fn resolve_call_id(
        &self,
        channel: &str,
        call_id: Option<CallId>,
    ) -> Result<(CallId, bool), DispatchError> {
        match call_id {
            Some(id) if id >= self.config.max_call_id => Err(DispatchError::InvalidCallId {
                channel: channel.to_string(),
                call_id: id,
                max: self.config.max_call_id,
            }),
            Some(id) => Ok((id, false)),
            None => self
                .call_ids
                .allocate()
                .map(|id| (id, true))
                .map_err(|source| DispatchError::CallIdUnavailable {
                    channel: channel.to_string(),
                    source,
                }),
        }
    }

    /// Check if a channel is registered.
    pub fn contains(&self, channel: &str) -> bool {
        self.handlers.contains_key(channel)
    }

    pub fn kind(&self, channel: &str) -> Option<ChannelKind> {
        self.handlers.get(channel).map(|handler| match handler {
            Handler::Sync(_) => ChannelKind::Sync,
            Handler::Async(_) => ChannelKind::Async,
        })
    }

    /// Registered channel names, sorted.
    pub fn channels(&self) -> Vec<&str> {
        let mut channels: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        channels.sort_unstable();
        channels
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.channels())
            .field("config", &self.config)
            .finish()
    }
}
