use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{Decoder, FrameConfig};
use crate::error::{FrameError, Result};
use crate::message::WireMessage;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads messages from any `Read` stream.
///
/// Partial reads are buffered; callers only ever see whole messages. After
/// an unknown-kind or malformed frame the reader stays in step and the next
/// call returns the following message.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    decoder: Decoder,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            decoder: Decoder::new(config.max_payload_size),
            config,
        }
    }

    /// Read the next message (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` on EOF, whether or not a
    /// frame was in progress.
    pub fn read_message(&mut self) -> Result<WireMessage> {
        loop {
            if let Some(message) = self.decoder.decode(&mut self.buf)? {
                return Ok(message);
            }
            self.fill()?;
        }
    }

    /// Append at least one byte from the stream to the buffer.
    fn fill(&mut self) -> Result<()> {
        let start = self.buf.len();
        self.buf.resize(start + READ_CHUNK_SIZE, 0);
        loop {
            match self.inner.read(&mut self.buf[start..]) {
                Ok(0) => {
                    self.buf.truncate(start);
                    if self.decoder.is_mid_frame() || !self.buf.is_empty() {
                        tracing::debug!(buffered = start, "stream ended inside a frame");
                    }
                    return Err(FrameError::ConnectionClosed);
                }
                Ok(n) => {
                    self.buf.truncate(start + n);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buf.truncate(start);
                    return Err(FrameError::Io(err));
                }
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(unix)]
impl FrameReader<std::os::unix::net::UnixStream> {
    /// Wrap a Unix stream, applying the read timeout from `config`.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: FrameConfig,
    ) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BufMut;
    use superipc_core::{Envelope, ResultMode};

    use super::*;
    use crate::codec::{encode_message, Header, DEFAULT_MAX_PAYLOAD};
    use crate::kind::EVENT;
    use crate::message::{EventMessage, ResponseMessage};

    fn event(content: &str) -> WireMessage {
        WireMessage::Event(EventMessage {
            stream: "count-ASYNC_REPLY".to_string(),
            envelope: Envelope::content(ResultMode::Progress, content, Some(1)),
        })
    }

    fn wire(messages: &[WireMessage]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for message in messages {
            encode_message(message, DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn reads_messages_in_order() {
        let response = WireMessage::Response(ResponseMessage {
            seq: 9,
            envelope: Envelope::content(ResultMode::Complete, "1", None),
        });
        let mut reader = FrameReader::new(Cursor::new(wire(&[event("1"), response.clone()])));

        assert_eq!(reader.read_message().unwrap(), event("1"));
        assert_eq!(reader.read_message().unwrap(), response);
    }

    #[test]
    fn byte_at_a_time_stream() {
        let mut reader = FrameReader::new(ByteByByteReader {
            bytes: wire(&[event("slow")]),
            pos: 0,
        });
        assert_eq!(reader.read_message().unwrap(), event("slow"));
    }

    #[test]
    fn skips_unknown_kind_and_continues() {
        let mut bytes = Header { kind: 77, len: 3 }.to_bytes().to_vec();
        bytes.extend_from_slice(b"???");
        bytes.extend_from_slice(&wire(&[event("after")]));

        let mut reader = FrameReader::new(ByteByByteReader { bytes, pos: 0 });
        assert!(matches!(
            reader.read_message(),
            Err(FrameError::UnknownKind { kind: 77, len: 3 })
        ));
        assert_eq!(reader.read_message().unwrap(), event("after"));
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert!(err.is_disconnect());
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_slice(&Header { kind: EVENT, len: 16 }.to_bytes());
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        assert!(matches!(
            reader.read_message(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn oversized_frame_in_stream() {
        let bytes = Header { kind: EVENT, len: 1024 }.to_bytes().to_vec();
        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(bytes), cfg);
        assert!(matches!(
            reader.read_message(),
            Err(FrameError::PayloadTooLarge { size: 1024, max: 16 })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::with_config_unix(right, FrameConfig::default()).unwrap();

        writer.write_message(&event("ping")).unwrap();
        assert_eq!(reader.read_message().unwrap(), event("ping"));
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }
}
