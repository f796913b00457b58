use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use superipc_core::{reply_stream_name, AppError, AsyncApi, CallId, CallIdAllocator, Envelope};

use crate::bridge::{Bridge, Listener};
use crate::demux::{ReceivedError, ReplyDemultiplexer};
use crate::error::{BridgeError, ClientError, Result};
use crate::subscription::Subscription;

/// Call site for one asynchronous channel.
///
/// Every [`AsyncCall::start`] reserves a fresh call id, clears the state of
/// the previous call, swaps the reply stream listener and invokes the
/// channel. The call id stays reserved for as long as the listener tracking
/// it is attached, settled or not, and goes back to the allocator on restart
/// or drop.
pub struct AsyncCall<C: AsyncApi, B: Bridge + ?Sized> {
    bridge: Arc<B>,
    call_ids: Arc<CallIdAllocator>,
    state: Arc<Mutex<ReplyDemultiplexer<C>>>,
    subscription: Subscription<B>,
}

impl<C: AsyncApi, B: Bridge + ?Sized> AsyncCall<C, B> {
    pub fn new(bridge: Arc<B>, call_ids: Arc<CallIdAllocator>) -> Self {
        Self::with_demultiplexer(bridge, call_ids, ReplyDemultiplexer::new())
    }

    /// Use a demultiplexer carrying observers.
    pub fn with_demultiplexer(
        bridge: Arc<B>,
        call_ids: Arc<CallIdAllocator>,
        demux: ReplyDemultiplexer<C>,
    ) -> Self {
        let subscription = Subscription::new(Arc::clone(&bridge), reply_stream_name(C::CHANNEL));
        Self {
            bridge,
            call_ids,
            state: Arc::new(Mutex::new(demux)),
            subscription,
        }
    }

    /// Start a new call with `props` and return the backend's acknowledgement.
    ///
    /// Reply stream envelopes delivered while the bridge invokes are already
    /// reflected in the state when this returns.
    pub fn start(&mut self, props: &C::Props) -> Result<Envelope> {
        let args = serde_json::to_value(props).map_err(|source| ClientError::Props {
            channel: C::CHANNEL,
            source,
        })?;

        self.release_tracked();
        let call_id = self.call_ids.allocate()?;
        self.lock().reset(call_id);
        let listener = self.listener();
        self.subscription.resubscribe(listener);
        tracing::debug!(channel = C::CHANNEL, call_id, "starting async call");

        match self.bridge.invoke(C::CHANNEL, Some(args), Some(call_id)) {
            Ok(ack) => {
                if let Some(raw) = ack.error.as_deref() {
                    self.abandon(call_id, ReceivedError::parse(raw));
                }
                Ok(ack)
            }
            Err(err @ BridgeError::ProtocolViolation(_)) => Err(err.into()),
            Err(err) => {
                self.abandon(call_id, ReceivedError::App(AppError::from_error(&err)));
                Err(err.into())
            }
        }
    }

    fn listener(&self) -> Listener {
        let state = Arc::clone(&self.state);
        Box::new(move |envelope| {
            let mut demux = state.lock().unwrap_or_else(PoisonError::into_inner);
            demux.handle(envelope).map(drop)
        })
    }

    /// Settle a call that could not be started.
    fn abandon(&self, call_id: CallId, error: ReceivedError) {
        let mut demux = self.lock();
        if demux.call_id() == Some(call_id) && !demux.is_settled() {
            tracing::warn!(channel = C::CHANNEL, call_id, error = %error, "async call failed to start");
            demux.set_error(error);
            demux.settle();
        }
    }

    /// Give back the id of the current call, settled or not. The listener
    /// stops matching it before the id can be handed out again.
    fn release_tracked(&self) {
        if let Some(call_id) = self.lock().untrack() {
            self.call_ids.release(call_id);
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReplyDemultiplexer<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Borrow the full demultiplexer state.
    pub fn state(&self) -> MutexGuard<'_, ReplyDemultiplexer<C>> {
        self.lock()
    }

    pub fn call_id(&self) -> Option<CallId> {
        self.lock().call_id()
    }

    pub fn initial_data(&self) -> Option<C::Init>
    where
        C::Init: Clone,
    {
        self.lock().initial_data().cloned()
    }

    pub fn progress_data(&self) -> Vec<C::Progress>
    where
        C::Progress: Clone,
    {
        self.lock().progress_data().to_vec()
    }

    pub fn last_progress_data(&self) -> Option<C::Progress>
    where
        C::Progress: Clone,
    {
        self.lock().last_progress_data().cloned()
    }

    pub fn complete_data(&self) -> Option<C::Complete>
    where
        C::Complete: Clone,
    {
        self.lock().complete_data().cloned()
    }

    pub fn error(&self) -> Option<ReceivedError> {
        self.lock().error().cloned()
    }

    /// True while a started call has not settled.
    pub fn loading(&self) -> bool {
        let demux = self.lock();
        demux.call_id().is_some() && !demux.is_settled()
    }
}

impl<C: AsyncApi, B: Bridge + ?Sized> Drop for AsyncCall<C, B> {
    fn drop(&mut self) {
        self.release_tracked();
    }
}

impl<C: AsyncApi, B: Bridge + ?Sized> std::fmt::Debug for AsyncCall<C, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncCall")
            .field("state", &*self.lock())
            .field("subscription", &self.subscription)
            .finish()
    }
}
