use superipc_core::{CallId, ChannelNameError};
use superipc_frame::FrameError;

/// Errors raised while registering channels. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// The channel name is not a valid identifier.
    #[error("invalid channel name {name:?}: {source}")]
    InvalidName {
        name: String,
        source: ChannelNameError,
    },

    /// A handler is already bound to this channel.
    #[error("channel '{0}' is already registered")]
    Duplicate(String),
}

/// Invocations refused before any handler ran.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Nothing is registered under the requested channel.
    #[error("no handler registered for channel '{0}'")]
    UnknownChannel(String),

    /// The supplied call id is outside the configured range.
    #[error("call id {call_id} out of range for channel '{channel}' (max {max})")]
    InvalidCallId {
        channel: String,
        call_id: CallId,
        max: u32,
    },

    /// No call id was supplied and none could be allocated.
    #[error("no call id available for channel '{channel}': {source}")]
    CallIdUnavailable {
        channel: String,
        source: superipc_core::CallIdError,
    },
}

impl DispatchError {
    /// Code reported to the caller alongside the rejection.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::UnknownChannel(_) => superipc_core::error::codes::HANDLER_NOT_FOUND,
            DispatchError::InvalidCallId { .. } | DispatchError::CallIdUnavailable { .. } => {
                superipc_core::error::codes::INVALID_CALL_ID
            }
        }
    }
}

/// Failures delivering an envelope to a reply stream.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The receiving end was torn down.
    #[error("reply destination is gone")]
    DestinationGone,

    /// The envelope could not be framed or written.
    #[error("reply delivery failed: {0}")]
    Frame(#[from] FrameError),
}

/// Errors that end a served connection.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// Frame-level error on the connection.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// I/O error preparing the connection.
    #[error("connection setup failed: {0}")]
    Io(#[from] std::io::Error),
}
