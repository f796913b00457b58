//! Length-prefixed framing for superipc traffic over a byte stream.
//!
//! Every frame carries:
//! - A 2-byte magic number ("SI") for stream synchronization
//! - A 4-byte little-endian payload length
//! - A 2-byte little-endian frame kind
//!
//! Payloads are JSON documents describing an invocation, its response, a
//! rejection, or an envelope pushed onto a reply stream.

pub mod codec;
pub mod error;
pub mod kind;
pub mod message;
pub mod reader;
pub mod writer;

pub use codec::{encode_message, Decoder, FrameConfig, Header, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use kind::{EVENT, INVOKE, REJECTED, RESPONSE};
pub use message::{EventMessage, InvokeMessage, RejectedMessage, ResponseMessage, WireMessage};
pub use reader::FrameReader;
pub use writer::FrameWriter;
