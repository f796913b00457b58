//! Backend side of superipc channels.
//!
//! Handlers are registered by channel name in a [`ChannelRegistry`]. Each
//! is wrapped by an adapter that turns its outcome into envelopes:
//! - [`SyncAdapter`]: one invocation, one `COMPLETE` envelope returned
//! - [`AsyncAdapter`]: init/progress/complete envelopes pushed through a
//!   [`ReplySink`] onto the channel's reply stream, tagged with the call id
//!
//! Handler failures never cross the channel as anything but an error
//! envelope. [`serve_connection`] runs a registry over a frame stream.

pub mod adapter;
pub mod emitter;
pub mod error;
pub mod host;
pub mod registry;
pub mod sink;

pub use adapter::{AsyncAdapter, SyncAdapter};
pub use emitter::Emitter;
pub use error::{DispatchError, RegistrationError, ServeError, SinkError};
pub use host::{serve_connection, serve_unix, ServeStats};
pub use registry::{ChannelKind, ChannelRegistry};
pub use sink::{MemorySink, ReplySink};
