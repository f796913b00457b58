//! Frame header layout and incremental message decoding.
//!
//! ```text
//! ┌────────────┬─────────────┬───────────┬──────────────────┐
//! │ "SI" (2B)  │ length (4B) │ kind (2B) │ JSON payload     │
//! │ 0x53 0x49  │ LE u32      │ LE u16    │ (length bytes)   │
//! └────────────┴─────────────┴───────────┴──────────────────┘
//! ```

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::kind;
use crate::message::WireMessage;

/// Frame header: magic (2) + length (4) + kind (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "SI" (0x53 0x49).
pub const MAGIC: [u8; 2] = [0x53, 0x49];

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Validated frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: u16,
    /// Payload length in bytes.
    pub len: usize,
}

impl Header {
    /// Parse the header at the front of `bytes`.
    ///
    /// Checks run in wire order: magic, kind, then length. An unknown kind
    /// is reported with its length so the payload can be skipped unread.
    pub fn parse(bytes: &[u8], max_payload: usize) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(FrameError::Truncated {
                needed: HEADER_SIZE,
                got: bytes.len(),
            });
        }
        if bytes[..2] != MAGIC {
            return Err(FrameError::InvalidMagic);
        }

        let mut fields = &bytes[2..HEADER_SIZE];
        let len = fields.get_u32_le() as usize;
        let kind = fields.get_u16_le();

        if !kind::is_known(kind) {
            return Err(FrameError::UnknownKind { kind, len });
        }
        if len > max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: max_payload,
            });
        }
        Ok(Self { kind, len })
    }

    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..2].copy_from_slice(&MAGIC);
        out[2..6].copy_from_slice(&(self.len as u32).to_le_bytes());
        out[6..].copy_from_slice(&self.kind.to_le_bytes());
        out
    }
}

/// Append `message` to `dst` as one frame.
///
/// The payload is serialized in place and the length patched in after, so
/// nothing is copied. On failure `dst` is left as it was.
pub fn encode_message(message: &WireMessage, max_payload: usize, dst: &mut BytesMut) -> Result<()> {
    let limit = max_payload.min(u32::MAX as usize);
    let start = dst.len();
    dst.put_slice(&Header { kind: message.kind(), len: 0 }.to_bytes());

    if let Err(err) = message.write_payload((&mut *dst).writer()) {
        dst.truncate(start);
        return Err(err);
    }

    let len = dst.len() - start - HEADER_SIZE;
    if len > limit {
        dst.truncate(start);
        return Err(FrameError::PayloadTooLarge { size: len, max: limit });
    }
    dst[start + 2..start + 6].copy_from_slice(&(len as u32).to_le_bytes());
    Ok(())
}

/// Pulls messages out of a growing byte buffer.
///
/// Keeps the parsed header of a frame whose payload is still arriving, and
/// the number of bytes left to throw away from an unknown-kind frame.
#[derive(Debug, Clone)]
pub struct Decoder {
    max_payload: usize,
    pending: Option<Header>,
    discard: usize,
}

impl Decoder {
    pub fn new(max_payload: usize) -> Self {
        Self {
            max_payload,
            pending: None,
            discard: 0,
        }
    }

    /// Decode the next message from the front of `src`.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Consumed bytes are
    /// removed from `src`. Unknown kinds and malformed payloads are consumed
    /// before the error is returned, so decoding can continue afterwards.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<WireMessage>> {
        if self.discard > 0 {
            self.skip(src);
            if self.discard > 0 {
                return Ok(None);
            }
        }

        let header = match self.pending {
            Some(header) => header,
            None => {
                if src.len() < HEADER_SIZE {
                    return Ok(None);
                }
                match Header::parse(&src[..HEADER_SIZE], self.max_payload) {
                    Ok(header) => {
                        src.advance(HEADER_SIZE);
                        self.pending = Some(header);
                        header
                    }
                    Err(err @ FrameError::UnknownKind { len, .. }) => {
                        src.advance(HEADER_SIZE);
                        self.discard = len;
                        self.skip(src);
                        return Err(err);
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        if src.len() < header.len {
            src.reserve(header.len - src.len());
            return Ok(None);
        }
        self.pending = None;
        let payload = src.split_to(header.len);
        WireMessage::decode(header.kind, &payload).map(Some)
    }

    /// True while part of a frame has been consumed.
    pub fn is_mid_frame(&self) -> bool {
        self.pending.is_some() || self.discard > 0
    }

    fn skip(&mut self, src: &mut BytesMut) {
        let n = self.discard.min(src.len());
        src.advance(n);
        self.discard -= n;
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use superipc_core::{Envelope, ResultMode};

    use super::*;
    use crate::kind::{EVENT, INVOKE, RESPONSE};
    use crate::message::{EventMessage, ResponseMessage};

    fn response(seq: u64) -> WireMessage {
        WireMessage::Response(ResponseMessage {
            seq,
            envelope: Envelope::empty_complete(None),
        })
    }

    fn raw(kind: u16, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_slice(&Header { kind, len: payload.len() }.to_bytes());
        buf.put_slice(payload);
        buf
    }

    #[test]
    fn header_layout() {
        let mut buf = BytesMut::new();
        encode_message(&response(1), DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();

        let header = Header::parse(&buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert_eq!(&buf[..2], b"SI");
        assert_eq!(header.kind, RESPONSE);
        assert_eq!(header.len, buf.len() - HEADER_SIZE);
    }

    #[test]
    fn decodes_back_to_back_messages() {
        let event = WireMessage::Event(EventMessage {
            stream: "count-ASYNC_REPLY".to_string(),
            envelope: Envelope::content(ResultMode::Progress, "1", Some(7)),
        });
        let mut buf = BytesMut::new();
        encode_message(&event, DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();
        encode_message(&response(2), DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();

        let mut decoder = Decoder::default();
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(event));
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(response(2)));
        assert!(buf.is_empty());
        assert!(!decoder.is_mid_frame());
    }

    #[test]
    fn waits_for_the_rest_of_a_frame() {
        let mut full = BytesMut::new();
        encode_message(&response(3), DEFAULT_MAX_PAYLOAD, &mut full).unwrap();
        let tail = full.split_off(HEADER_SIZE + 2);

        let mut decoder = Decoder::default();
        let mut buf = full;
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        assert!(decoder.is_mid_frame());

        buf.extend_from_slice(&tail);
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(response(3)));
    }

    #[test]
    fn unknown_kind_is_rejected_at_the_header() {
        let mut buf = BytesMut::new();
        buf.put_slice(&Header { kind: 9, len: 64 * 1024 * 1024 }.to_bytes());
        buf.put_slice(b"junk");

        let mut decoder = Decoder::new(1024);
        let err = decoder.decode(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::UnknownKind { kind: 9, .. }));
        assert!(buf.is_empty());
        assert!(decoder.is_mid_frame());
    }

    #[test]
    fn decoding_resumes_after_unknown_kind() {
        let mut buf = raw(42, b"{}");
        encode_message(&response(4), DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();

        let mut decoder = Decoder::default();
        assert!(matches!(
            decoder.decode(&mut buf),
            Err(FrameError::UnknownKind { kind: 42, len: 2 })
        ));
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(response(4)));
    }

    #[test]
    fn malformed_payload_is_consumed() {
        let mut buf = raw(INVOKE, b"not json");
        encode_message(&response(5), DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();

        let mut decoder = Decoder::default();
        assert!(matches!(
            decoder.decode(&mut buf),
            Err(FrameError::Malformed { kind: "INVOKE", .. })
        ));
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(response(5)));
    }

    #[test]
    fn invalid_magic() {
        let mut buf = BytesMut::from(&[0x49, 0x50, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00][..]);
        let result = Decoder::default().decode(&mut buf);
        assert!(matches!(result, Err(FrameError::InvalidMagic)));
    }

    #[test]
    fn oversized_length_is_rejected_before_payload_arrives() {
        let mut buf = BytesMut::new();
        buf.put_slice(&Header { kind: EVENT, len: 32 * 1024 * 1024 }.to_bytes());

        let result = Decoder::default().decode(&mut buf);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn encode_respects_limit_and_leaves_buffer_untouched() {
        let mut buf = BytesMut::from(&b"prefix"[..]);
        let err = encode_message(&response(6), 4, &mut buf).unwrap_err();

        assert!(matches!(err, FrameError::PayloadTooLarge { max: 4, .. }));
        assert_eq!(&buf[..], b"prefix");
    }

    #[test]
    fn short_header_slice_is_truncated() {
        assert!(matches!(
            Header::parse(&MAGIC, DEFAULT_MAX_PAYLOAD),
            Err(FrameError::Truncated { needed: HEADER_SIZE, got: 2 })
        ));
    }
}
