use superipc_core::{CallIdError, ProtocolViolation};
use superipc_frame::FrameError;

/// Failures of the host transport primitives.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The backend end of the bridge is gone.
    #[error("destination is gone")]
    DestinationGone,

    /// The backend refused the invocation before running a handler.
    #[error("invocation rejected ({code}): {reason}")]
    Rejected { code: String, reason: String },

    /// Frame-level error on a stream transport.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A message could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A listener observed an envelope for a call that had already settled.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),

    /// The peer sent a message the caller side never expects.
    #[error("unexpected {0} message from backend")]
    UnexpectedMessage(&'static str),
}

impl BridgeError {
    /// True if the error means the backend can no longer be reached.
    pub fn is_disconnect(&self) -> bool {
        match self {
            BridgeError::DestinationGone => true,
            BridgeError::Frame(err) => err.is_disconnect(),
            _ => false,
        }
    }
}

/// Errors returned by call sites.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// No call identifier could be reserved for the call.
    #[error("call id unavailable: {0}")]
    CallId(#[from] CallIdError),

    /// The call arguments could not be serialized.
    #[error("failed serializing arguments for {channel}: {source}")]
    Props {
        channel: &'static str,
        source: serde_json::Error,
    },
}

impl From<ProtocolViolation> for ClientError {
    fn from(violation: ProtocolViolation) -> Self {
        ClientError::Bridge(BridgeError::ProtocolViolation(violation))
    }
}

/// Convenience alias for call site results.
pub type Result<T> = std::result::Result<T, ClientError>;
