use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::call_id::CallId;
use crate::envelope::ResultMode;

/// Machine-readable codes placed in an [`AppError`] context under `"code"`.
pub mod codes {
    /// No handler is registered for the requested channel.
    pub const HANDLER_NOT_FOUND: &str = "HANDLER_NOT_FOUND";
    /// The request arguments could not be decoded for the channel.
    pub const INVALID_PAYLOAD: &str = "INVALID_PAYLOAD";
    /// A success payload could not be turned into text.
    pub const SERIALIZATION_FAILED: &str = "SERIALIZATION_FAILED";
    /// The call identifier supplied with an asynchronous call was unusable.
    pub const INVALID_CALL_ID: &str = "INVALID_CALL_ID";
}

/// Structured, chainable error that survives serialization.
///
/// Nested `AppError`s keep their full structure. Any other error nested
/// through [`AppError::with_source`] is reduced to `{ message, stack }`,
/// and the chain stops there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct AppError {
    pub message: String,
    #[source]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<AppError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<Value>,
}

impl AppError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            inner: None,
            context: None,
            stack: None,
        }
    }

    /// Nest another `AppError`, keeping its structure.
    pub fn with_inner(mut self, inner: AppError) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Nest a foreign error, reduced to its message and debug rendering.
    pub fn with_source(mut self, source: &(dyn std::error::Error + 'static)) -> Self {
        self.inner = Some(Box::new(Self::plain(source)));
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<Value>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Build from a foreign error, using its message as this error's message.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut app = Self::new(err.to_string()).with_stack(format!("{err:?}"));
        if let Some(source) = err.source() {
            app = app.with_source(source);
        }
        app
    }

    fn plain(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(err.to_string()).with_stack(format!("{err:?}"))
    }

    /// `context.code`, when present.
    pub fn code(&self) -> Option<&str> {
        self.context.as_ref()?.get("code")?.as_str()
    }

    /// Iterate this error and every nested `inner`, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &AppError> {
        std::iter::successors(Some(self), |err| err.inner.as_deref())
    }

    /// Serialize to JSON text. Never fails: if the context cannot be
    /// serialized the message alone is kept.
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(error = %err, "failed serializing error envelope, dropping context");
                serde_json::json!({ "message": self.message }).to_string()
            }
        }
    }

    /// Parse JSON text produced by [`AppError::to_json`].
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        serde_json::from_str(json).map_err(|err| {
            AppError::new("Error occurred while parsing AppError from JSON").with_source(&err)
        })
    }
}

impl From<String> for AppError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for AppError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::from_error(&err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::from_error(&err)
    }
}

/// Errors from call identifier allocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallIdError {
    /// Every identifier in the range is in flight.
    #[error("call id space exhausted ({in_flight} calls in flight)")]
    Exhausted { in_flight: usize },

    /// The identifier lies outside `[0, max)`.
    #[error("call id {call_id} out of range (max {max})")]
    OutOfRange { call_id: CallId, max: u32 },

    /// The identifier is already used by a call in flight.
    #[error("call id {0} already in flight")]
    InFlight(CallId),
}

/// Reasons a channel name is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelNameError {
    #[error("channel name is empty")]
    Empty,

    #[error("channel name too long ({len} bytes, max {max})")]
    TooLong { len: usize, max: usize },

    #[error("invalid character {ch:?} in channel name {name:?}")]
    InvalidCharacter { name: String, ch: char },

    #[error("channel name {0:?} ends with the reply stream suffix")]
    ReservedSuffix(String),
}

/// An envelope arrived for a call that had already settled.
///
/// This signals a backend that completed the same call twice. It is never
/// recovered from; consumers see it as a hard failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{result_mode} envelope received for call {call_id} after it completed")]
pub struct ProtocolViolation {
    pub call_id: CallId,
    pub result_mode: ResultMode,
}
