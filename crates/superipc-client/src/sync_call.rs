use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use superipc_core::{Envelope, SyncApi};

use crate::bridge::Bridge;
use crate::demux::{decode_content, ReceivedError};
use crate::error::{ClientError, Result};

/// Decoded answer of a synchronous channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome<T> {
    pub data: Option<T>,
    pub error: Option<ReceivedError>,
}

impl<T> Default for SyncOutcome<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
        }
    }
}

impl<T: DeserializeOwned> SyncOutcome<T> {
    /// Decode a sync envelope. Malformed content yields no data.
    pub fn from_envelope(channel: &str, envelope: &Envelope) -> Self {
        let data = envelope
            .content
            .as_deref()
            .and_then(|content| decode_content(channel, envelope.result_mode, content));
        let error = envelope.error.as_deref().map(ReceivedError::parse);
        Self { data, error }
    }
}

/// Call site for one synchronous channel.
///
/// Data from the last successful answer is kept across fetches; the error
/// always reflects the latest answer.
pub struct SyncCall<C: SyncApi, B: Bridge + ?Sized> {
    bridge: Arc<B>,
    outcome: SyncOutcome<C::Output>,
    loading: bool,
    _contract: PhantomData<fn() -> C>,
}

impl<C: SyncApi, B: Bridge + ?Sized> SyncCall<C, B> {
    pub fn new(bridge: Arc<B>) -> Self {
        Self {
            bridge,
            outcome: SyncOutcome::default(),
            loading: false,
            _contract: PhantomData,
        }
    }

    /// Invoke the channel with `props` and record its answer.
    pub fn fetch(&mut self, props: &C::Props) -> Result<&SyncOutcome<C::Output>> {
        self.loading = true;
        let outcome = call::<C, B>(&self.bridge, props);
        self.loading = false;
        let outcome = outcome?;

        if outcome.data.is_some() {
            self.outcome.data = outcome.data;
        }
        self.outcome.error = outcome.error;
        Ok(&self.outcome)
    }

    pub fn data(&self) -> Option<&C::Output> {
        self.outcome.data.as_ref()
    }

    pub fn error(&self) -> Option<&ReceivedError> {
        self.outcome.error.as_ref()
    }

    /// True while a fetch is waiting on the bridge. A call site that was
    /// never asked to fetch is not loading.
    pub fn loading(&self) -> bool {
        self.loading
    }
}

/// One-shot typed invocation of a synchronous channel.
pub fn call<C: SyncApi, B: Bridge + ?Sized>(
    bridge: &B,
    props: &C::Props,
) -> Result<SyncOutcome<C::Output>> {
    let args = serde_json::to_value(props).map_err(|source| ClientError::Props {
        channel: C::CHANNEL,
        source,
    })?;
    let envelope = bridge.invoke(C::CHANNEL, Some(args), None)?;
    tracing::debug!(
        channel = C::CHANNEL,
        is_error = envelope.is_error(),
        "sync call answered"
    );
    Ok(SyncOutcome::from_envelope(C::CHANNEL, &envelope))
}

impl<C: SyncApi, B: Bridge + ?Sized> std::fmt::Debug for SyncCall<C, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCall")
            .field("channel", &C::CHANNEL)
            .field("has_data", &self.outcome.data.is_some())
            .field("error", &self.outcome.error)
            .field("loading", &self.loading)
            .finish()
    }
}
