use std::fmt;

use serde::de::DeserializeOwned;
use superipc_core::{AppError, AsyncApi, CallId, Envelope, ProtocolViolation, ResultMode};

/// Error payload received from the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceivedError {
    /// A well-formed error envelope.
    App(AppError),
    /// Text that did not parse as an error envelope, kept verbatim.
    Raw(String),
}

impl ReceivedError {
    pub fn parse(raw: &str) -> Self {
        match AppError::from_json(raw) {
            Ok(err) => ReceivedError::App(err),
            Err(_) => {
                tracing::warn!(error = raw, "received error that is not an error envelope");
                ReceivedError::Raw(raw.to_string())
            }
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ReceivedError::App(err) => &err.message,
            ReceivedError::Raw(raw) => raw,
        }
    }

    pub fn as_app_error(&self) -> Option<&AppError> {
        match self {
            ReceivedError::App(err) => Some(err),
            ReceivedError::Raw(_) => None,
        }
    }
}

impl fmt::Display for ReceivedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Parse envelope content, degrading to `None` on malformed text.
pub(crate) fn decode_content<T: DeserializeOwned>(
    channel: &str,
    mode: ResultMode,
    content: &str,
) -> Option<T> {
    match serde_json::from_str(content) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                channel,
                result_mode = %mode,
                error = %err,
                "invalid JSON content, no value recorded"
            );
            None
        }
    }
}

/// What [`ReplyDemultiplexer::handle`] did with an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The envelope belongs to another call.
    Ignored,
    /// A non-terminal envelope was recorded.
    Recorded,
    /// The terminal envelope was recorded; the call is settled.
    Settled,
}

type Observer<T> = Box<dyn FnMut(&T) + Send>;

struct Observers<C: AsyncApi> {
    init: Option<Observer<C::Init>>,
    progress: Option<Observer<C::Progress>>,
    complete: Option<Observer<C::Complete>>,
}

impl<C: AsyncApi> Default for Observers<C> {
    fn default() -> Self {
        Self {
            init: None,
            progress: None,
            complete: None,
        }
    }
}

/// Accumulates the envelopes of one call out of a shared reply stream.
///
/// Envelopes carrying another call id are ignored. Anything arriving for
/// the tracked call after its `COMPLETE` is a [`ProtocolViolation`].
pub struct ReplyDemultiplexer<C: AsyncApi> {
    call_id: Option<CallId>,
    init: Option<C::Init>,
    progress: Vec<C::Progress>,
    complete: Option<C::Complete>,
    error: Option<ReceivedError>,
    settled: bool,
    observers: Observers<C>,
}

impl<C: AsyncApi> ReplyDemultiplexer<C> {
    /// Create a demultiplexer that tracks no call yet.
    pub fn new() -> Self {
        Self {
            call_id: None,
            init: None,
            progress: Vec::new(),
            complete: None,
            error: None,
            settled: false,
            observers: Observers::default(),
        }
    }

    pub fn on_init(mut self, observer: impl FnMut(&C::Init) + Send + 'static) -> Self {
        self.observers.init = Some(Box::new(observer));
        self
    }

    pub fn on_progress(mut self, observer: impl FnMut(&C::Progress) + Send + 'static) -> Self {
        self.observers.progress = Some(Box::new(observer));
        self
    }

    pub fn on_complete(mut self, observer: impl FnMut(&C::Complete) + Send + 'static) -> Self {
        self.observers.complete = Some(Box::new(observer));
        self
    }

    /// Track `call_id`, discarding everything accumulated so far.
    pub fn reset(&mut self, call_id: CallId) {
        self.call_id = Some(call_id);
        self.init = None;
        self.progress.clear();
        self.complete = None;
        self.error = None;
        self.settled = false;
    }

    /// Feed one reply stream envelope.
    pub fn handle(&mut self, envelope: &Envelope) -> Result<Delivery, ProtocolViolation> {
        let Some(call_id) = self.call_id.filter(|id| envelope.call_id == Some(*id)) else {
            return Ok(Delivery::Ignored);
        };

        if self.settled {
            let violation = ProtocolViolation {
                call_id,
                result_mode: envelope.result_mode,
            };
            tracing::error!(
                channel = C::CHANNEL,
                call_id,
                result_mode = %envelope.result_mode,
                "async data received after completion"
            );
            return Err(violation);
        }

        if let Some(raw) = envelope.error.as_deref() {
            self.error = Some(ReceivedError::parse(raw));
        }

        if let Some(content) = envelope.content.as_deref() {
            self.record(envelope.result_mode, content);
        }

        if envelope.result_mode.is_terminal() {
            self.settled = true;
            tracing::debug!(channel = C::CHANNEL, call_id, "call settled");
            return Ok(Delivery::Settled);
        }
        Ok(Delivery::Recorded)
    }

    fn record(&mut self, mode: ResultMode, content: &str) {
        match mode {
            ResultMode::Init => {
                if let Some(value) = decode_content::<C::Init>(C::CHANNEL, mode, content) {
                    if let Some(observer) = self.observers.init.as_mut() {
                        observer(&value);
                    }
                    self.init = Some(value);
                }
            }
            ResultMode::Progress => {
                if let Some(value) = decode_content::<C::Progress>(C::CHANNEL, mode, content) {
                    if let Some(observer) = self.observers.progress.as_mut() {
                        observer(&value);
                    }
                    self.progress.push(value);
                }
            }
            ResultMode::Complete => {
                if let Some(value) = decode_content::<C::Complete>(C::CHANNEL, mode, content) {
                    if let Some(observer) = self.observers.complete.as_mut() {
                        observer(&value);
                    }
                    self.complete = Some(value);
                }
            }
        }
    }

    pub fn call_id(&self) -> Option<CallId> {
        self.call_id
    }

    pub fn initial_data(&self) -> Option<&C::Init> {
        self.init.as_ref()
    }

    pub fn progress_data(&self) -> &[C::Progress] {
        &self.progress
    }

    pub fn last_progress_data(&self) -> Option<&C::Progress> {
        self.progress.last()
    }

    pub fn complete_data(&self) -> Option<&C::Complete> {
        self.complete.as_ref()
    }

    pub fn error(&self) -> Option<&ReceivedError> {
        self.error.as_ref()
    }

    /// Stop tracking the current call, keeping what it accumulated.
    pub(crate) fn untrack(&mut self) -> Option<CallId> {
        self.call_id.take()
    }

    pub(crate) fn set_error(&mut self, error: ReceivedError) {
        self.error = Some(error);
    }

    pub(crate) fn settle(&mut self) {
        self.settled = true;
    }

    /// True once the tracked call's `COMPLETE` has been handled.
    pub fn is_settled(&self) -> bool {
        self.settled
    }
}

impl<C: AsyncApi> Default for ReplyDemultiplexer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: AsyncApi> fmt::Debug for ReplyDemultiplexer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyDemultiplexer")
            .field("channel", &C::CHANNEL)
            .field("call_id", &self.call_id)
            .field("progress", &self.progress.len())
            .field("error", &self.error)
            .field("settled", &self.settled)
            .finish()
    }
}
