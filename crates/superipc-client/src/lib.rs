//! Caller side of superipc channels.
//!
//! The host transport is injected as a [`Bridge`] with three primitives:
//! invoke a channel, attach a listener to a reply stream, detach it.
//! On top of it:
//! - [`ReplyDemultiplexer`] picks one call's envelopes out of a shared
//!   reply stream by call id
//! - [`Subscription`] owns the single listener of a call site
//! - [`SyncCall`] and [`AsyncCall`] are typed call sites built from channel
//!   contracts
//! - [`StreamBridge`] speaks the frame protocol to a served registry

pub mod async_call;
pub mod bridge;
pub mod client;
pub mod demux;
pub mod error;
pub mod stream;
pub mod subscription;
pub mod sync_call;

pub use async_call::AsyncCall;
pub use bridge::{Bridge, Listener, ListenerId, ListenerTable};
pub use client::Client;
pub use demux::{Delivery, ReceivedError, ReplyDemultiplexer};
pub use error::{BridgeError, ClientError, Result};
pub use stream::StreamBridge;
pub use subscription::Subscription;
pub use sync_call::{SyncCall, SyncOutcome};
