use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use superipc_core::error::codes;
use superipc_core::{AppError, AsyncApi, CallId, Envelope, ResultMode, SyncApi};

use crate::emitter::{Emitter, RawEmitter};
use crate::sink::ReplySink;

type SyncCall = dyn Fn(&str, Option<Value>) -> Result<String, AppError> + Send + Sync;
type AsyncCall = dyn Fn(&str, Option<Value>, &RawEmitter<'_>) -> Result<(), AppError> + Send + Sync;

/// Wraps a single-shot handler so every invocation yields exactly one
/// `COMPLETE` envelope.
pub struct SyncAdapter {
    call: Box<SyncCall>,
}

impl SyncAdapter {
    /// Adapt `handler`, decoding arguments into `P` and serializing `R`.
    pub fn new<P, R, F>(handler: F) -> Self
    where
        P: DeserializeOwned,
        R: Serialize,
        F: Fn(P) -> Result<R, AppError> + Send + Sync + 'static,
    {
        Self {
            call: Box::new(move |channel, args| {
                let props = decode_props::<P>(channel, args)?;
                let output = handler(props)?;
                encode_content(channel, ResultMode::Complete, &output)
            }),
        }
    }

    /// Adapt a handler typed by a channel contract.
    pub fn for_api<A, F>(handler: F) -> Self
    where
        A: SyncApi,
        F: Fn(A::Props) -> Result<A::Output, AppError> + Send + Sync + 'static,
    {
        Self::new(handler)
    }

    /// Run the handler once and wrap the outcome.
    ///
    /// Handler errors, panics and unserializable results all come back as
    /// an error envelope; this never fails.
    pub fn call(&self, channel: &str, args: Option<Value>) -> Envelope {
        let outcome = catch_unwind(AssertUnwindSafe(|| (self.call)(channel, args)))
            .unwrap_or_else(|payload| Err(panic_error(channel, payload)));

        match outcome {
            Ok(content) => {
                tracing::debug!(channel, size = content.len(), "sync call succeeded");
                Envelope::content(ResultMode::Complete, content, None)
            }
            Err(err) => {
                tracing::debug!(channel, error = %err, "sync call failed");
                Envelope::error(ResultMode::Complete, err.to_json(), None)
            }
        }
    }
}

impl fmt::Debug for SyncAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncAdapter").finish_non_exhaustive()
    }
}

/// Wraps a long-running handler that reports through an [`Emitter`].
///
/// Every invocation produces exactly one terminal envelope on the reply
/// stream:
/// - the handler's own `on_complete`/`on_error`, or
/// - the handler's return value when it returns without completing, or
/// - an error envelope when it fails or panics before completing.
pub struct AsyncAdapter {
    call: Box<AsyncCall>,
}

impl AsyncAdapter {
    /// Adapt `handler`.
    ///
    /// Returning `Ok(Some(value))` without calling `on_complete` is the same
    /// as calling `on_complete(value)`. `Ok(None)` completes with no content.
    pub fn new<P, I, G, C, F>(handler: F) -> Self
    where
        P: DeserializeOwned,
        I: Serialize,
        G: Serialize,
        C: Serialize,
        F: Fn(P, &Emitter<'_, I, G, C>) -> Result<Option<C>, AppError> + Send + Sync + 'static,
    {
        Self {
            call: Box::new(move |channel, args, raw| {
                let props = decode_props::<P>(channel, args)?;
                let emitter = Emitter::new(raw);
                let returned = handler(props, &emitter)?;

                if raw.is_terminated() {
                    if returned.is_some() {
                        tracing::trace!(
                            channel,
                            call_id = raw.call_id(),
                            "call already completed, return value ignored"
                        );
                    }
                    return Ok(());
                }
                match returned {
                    Some(value) => raw.emit(ResultMode::Complete, &value),
                    None => raw.emit_empty_complete(),
                }
                Ok(())
            }),
        }
    }

    /// Adapt a handler typed by a channel contract.
    pub fn for_api<A, F>(handler: F) -> Self
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
        Self::new(handler)
    }

    /// Run the handler for call `call_id`, emitting through `sink`.
    ///
    /// Returns the acknowledgement envelope for the invocation itself; the
    /// call's results travel on the reply stream.
    pub fn call(
        &self,
        channel: &str,
        args: Option<Value>,
        call_id: CallId,
        sink: &dyn ReplySink,
    ) -> Envelope {
        let raw = RawEmitter::new(channel, call_id, sink);
        let outcome = catch_unwind(AssertUnwindSafe(|| (self.call)(channel, args, &raw)))
            .unwrap_or_else(|payload| Err(panic_error(channel, payload)));

        if let Err(err) = outcome {
            if raw.is_terminated() {
                tracing::warn!(
                    channel,
                    call_id,
                    error = %err,
                    "handler failed after completing, failure not forwarded"
                );
            } else {
                tracing::debug!(channel, call_id, error = %err, "async call failed");
                raw.emit_error(&err);
            }
        }

        tracing::debug!(channel, call_id, emitted = raw.emitted(), "async call finished");
        Envelope::empty_complete(Some(call_id))
    }
}

impl fmt::Debug for AsyncAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncAdapter").finish_non_exhaustive()
    }
}

fn decode_props<P: DeserializeOwned>(channel: &str, args: Option<Value>) -> Result<P, AppError> {
    serde_json::from_value(args.unwrap_or(Value::Null)).map_err(|err| {
        AppError::new(format!("invalid arguments for channel '{channel}'"))
            .with_source(&err)
            .with_context(json!({ "code": codes::INVALID_PAYLOAD, "channel": channel }))
    })
}

/// Serialize a success payload, describing any failure as an `AppError`.
pub(crate) fn encode_content<T: Serialize>(
    channel: &str,
    mode: ResultMode,
    value: &T,
) -> Result<String, AppError> {
    serde_json::to_string(value).map_err(|err| {
        tracing::warn!(channel, result_mode = %mode, error = %err, "failed serializing result");
        AppError::new(format!(
            "failed to serialize {mode} result for channel '{channel}'"
        ))
        .with_source(&err)
        .with_context(json!({
            "code": codes::SERIALIZATION_FAILED,
            "channel": channel,
            "resultMode": mode,
            "content": Value::Null,
        }))
    })
}

fn panic_error(channel: &str, payload: Box<dyn Any + Send>) -> AppError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|msg| (*msg).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    tracing::error!(channel, panic = %detail, "handler panicked");
    AppError::new(format!("handler for channel '{channel}' panicked: {detail}"))
}
