use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_message, FrameConfig};
use crate::error::{FrameError, Result};
use crate::message::WireMessage;

/// Writes messages to any `Write` stream, one frame each.
///
/// A write timeout on the underlying stream surfaces as an I/O error rather
/// than being retried.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            config,
        }
    }

    /// Frame and send one message, flushing the stream.
    pub fn write_message(&mut self, message: &WireMessage) -> Result<()> {
        self.buf.clear();
        encode_message(message, self.config.max_payload_size, &mut self.buf)?;

        let mut written = 0;
        while written < self.buf.len() {
            match self.inner.write(&self.buf[written..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => written += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        tracing::trace!(kind = message.kind(), size = written, "frame written");

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(unix)]
impl FrameWriter<std::os::unix::net::UnixStream> {
    /// Wrap a Unix stream, applying the write timeout from `config`.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: FrameConfig,
    ) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
