//! Typed request/reply channels with progress streams.
//!
//! A backend registers handlers by channel name. Synchronous channels answer
//! an invocation with one envelope; asynchronous channels push init,
//! progress and completion envelopes onto a reply stream shared by every
//! call of the channel, tagged with a call id the caller demultiplexes on.
//!
//! # Crate Structure
//!
//! - [`protocol`]: envelopes, error envelopes, call ids, channel contracts
//! - [`frame`]: length-prefixed framing of invocations and reply events
//! - [`backend`]: adapters, the channel registry and the connection host
//! - [`client`]: bridges, reply demultiplexing and call sites
//! - [`LocalBridge`]: a registry and a client joined in one process

/// Re-export envelope and contract types.
pub mod protocol {
    pub use superipc_core::*;
}

/// Re-export frame types.
pub mod frame {
    pub use superipc_frame::*;
}

/// Re-export backend types.
pub mod backend {
    pub use superipc_backend::*;
}

/// Re-export client types.
pub mod client {
    pub use superipc_client::*;
}

pub mod demo;
pub mod local;

pub use local::LocalBridge;
