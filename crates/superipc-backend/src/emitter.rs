use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::Serialize;
use superipc_core::{reply_stream_name, AppError, CallId, Envelope, ResultMode};

use crate::adapter::encode_content;
use crate::error::SinkError;
use crate::sink::ReplySink;

/// Untyped emission state for one asynchronous call.
///
/// Every emission is serialized immediately and pushed onto the reply
/// stream in call order. Deliveries to a torn-down receiver are dropped
/// and logged.
pub(crate) struct RawEmitter<'a> {
    channel: &'a str,
    stream: String,
    call_id: CallId,
    sink: &'a dyn ReplySink,
    terminated: AtomicBool,
    emitted: AtomicUsize,
}

impl<'a> RawEmitter<'a> {
    pub(crate) fn new(channel: &'a str, call_id: CallId, sink: &'a dyn ReplySink) -> Self {
        Self {
            channel,
            stream: reply_stream_name(channel),
            call_id,
            sink,
            terminated: AtomicBool::new(false),
            emitted: AtomicUsize::new(0),
        }
    }

    pub(crate) fn emit<T: Serialize>(&self, mode: ResultMode, value: &T) {
        let envelope = match encode_content(self.channel, mode, value) {
            Ok(content) => Envelope::content(mode, content, Some(self.call_id)),
            Err(err) => Envelope::error(mode, err.to_json(), Some(self.call_id)),
        };
        self.push(envelope);
    }

    pub(crate) fn emit_error(&self, err: &AppError) {
        self.push(Envelope::error(
            ResultMode::Complete,
            err.to_json(),
            Some(self.call_id),
        ));
    }

    pub(crate) fn emit_empty_complete(&self) {
        self.push(Envelope::empty_complete(Some(self.call_id)));
    }

    /// True once any `COMPLETE` envelope has been emitted for this call.
    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub(crate) fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }

    pub(crate) fn call_id(&self) -> CallId {
        self.call_id
    }

    pub(crate) fn channel(&self) -> &str {
        self.channel
    }

    fn push(&self, envelope: Envelope) {
        if envelope.is_terminal() {
            self.terminated.store(true, Ordering::SeqCst);
        }
        self.emitted.fetch_add(1, Ordering::SeqCst);

        match self.sink.send(&self.stream, &envelope) {
            Ok(()) => tracing::debug!(
                channel = self.channel,
                call_id = self.call_id,
                result_mode = %envelope.result_mode,
                is_error = envelope.is_error(),
                "emitted reply"
            ),
            Err(SinkError::DestinationGone) => tracing::warn!(
                channel = self.channel,
                call_id = self.call_id,
                result_mode = %envelope.result_mode,
                "reply destination gone, dropping envelope"
            ),
            Err(err) => tracing::warn!(
                channel = self.channel,
                call_id = self.call_id,
                result_mode = %envelope.result_mode,
                error = %err,
                "failed delivering reply, dropping envelope"
            ),
        }
    }
}

/// Emission handle given to asynchronous handlers.
///
/// `I`, `P` and `C` are the init, progress and completion payload types of
/// the channel. Handlers are trusted to call [`Emitter::on_init`] at most
/// once and to emit nothing after completing; the emitter does not police
/// either rule.
pub struct Emitter<'a, I, P, C> {
    raw: &'a RawEmitter<'a>,
    _payloads: PhantomData<fn(I, P, C)>,
}

impl<'a, I, P, C> Emitter<'a, I, P, C>
where
    I: Serialize,
    P: Serialize,
    C: Serialize,
{
    pub(crate) fn new(raw: &'a RawEmitter<'a>) -> Self {
        Self {
            raw,
            _payloads: PhantomData,
        }
    }

    /// Send the `INIT` envelope.
    pub fn on_init(&self, value: I) {
        self.raw.emit(ResultMode::Init, &value);
    }

    /// Append a `PROGRESS` envelope.
    pub fn on_progress(&self, value: P) {
        self.raw.emit(ResultMode::Progress, &value);
    }

    /// Send the terminal `COMPLETE` envelope carrying `value`.
    pub fn on_complete(&self, value: C) {
        self.raw.emit(ResultMode::Complete, &value);
    }

    /// Send a terminal `COMPLETE` envelope carrying `error`.
    pub fn on_error(&self, error: impl Into<AppError>) {
        self.raw.emit_error(&error.into());
    }

    /// Identifier every envelope of this call is tagged with.
    pub fn call_id(&self) -> CallId {
        self.raw.call_id()
    }

    pub fn channel(&self) -> &str {
        self.raw.channel()
    }

    /// True once a terminal envelope has been sent.
    pub fn has_completed(&self) -> bool {
        self.raw.is_terminated()
    }
}
