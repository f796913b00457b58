//! Wire model for multiplexed request/reply channels.
//!
//! Every reply crossing the boundary is a [`Envelope`]:
//! - an optional serialized success payload (`content`)
//! - an optional serialized [`AppError`] (`error`)
//! - the phase it represents ([`ResultMode`])
//! - the call identifier used to demultiplex a shared reply stream
//!
//! Payloads stay opaque JSON text on the wire. Typed access is layered on
//! top through the [`SyncApi`] and [`AsyncApi`] contracts.

pub mod api;
pub mod call_id;
pub mod channel;
pub mod config;
pub mod envelope;
pub mod error;

pub use api::{AsyncApi, Payload, SyncApi};
pub use call_id::{CallId, CallIdAllocator};
pub use channel::{reply_stream_name, validate_channel_name, ASYNC_REPLY_SUFFIX};
pub use config::{ProtocolConfig, DEFAULT_MAX_CALL_ID};
pub use envelope::{Envelope, ResultMode};
pub use error::{AppError, CallIdError, ChannelNameError, ProtocolViolation};
