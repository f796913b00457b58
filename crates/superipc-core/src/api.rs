//! Compile-time channel contracts.
//!
//! The wire carries opaque JSON text. A contract ties a channel name to the
//! Rust types flowing through it, so both the backend adapter and the
//! caller-side call site are generated from the same definition:
//!
//! ```
//! use superipc_core::{AsyncApi, SyncApi};
//!
//! struct Ping;
//! impl SyncApi for Ping {
//!     const CHANNEL: &'static str = "ping";
//!     type Props = serde_json::Value;
//!     type Output = serde_json::Value;
//! }
//!
//! struct Count;
//! impl AsyncApi for Count {
//!     const CHANNEL: &'static str = "count";
//!     type Props = u32;
//!     type Init = ();
//!     type Progress = u32;
//!     type Complete = u32;
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Marker for types that can cross the channel boundary.
pub trait Payload: Serialize + DeserializeOwned + Send + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Send + 'static {}

/// A single-shot channel: one request, one envelope back.
pub trait SyncApi {
    const CHANNEL: &'static str;
    type Props: Payload;
    type Output: Payload;
}

/// A long-running channel reporting init, progress and completion on its
/// reply stream.
///
/// `'static` because reply stream listeners built from a contract are boxed
/// and handed to the bridge.
pub trait AsyncApi: 'static {
    const CHANNEL: &'static str;
    type Props: Payload;
    type Init: Payload;
    type Progress: Payload;
    type Complete: Payload;
}
