use std::io::{Read, Write};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use superipc_core::{CallId, Envelope};
use superipc_frame::{
    FrameConfig, FrameError, FrameReader, FrameWriter, InvokeMessage, WireMessage,
};

use crate::bridge::{Bridge, Listener, ListenerId, ListenerTable};
use crate::error::BridgeError;

struct Connection<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    next_seq: u64,
}

/// Bridge speaking the frame protocol over a byte stream.
///
/// [`Bridge::invoke`] writes the request and then reads frames until the
/// matching response, handing every reply stream event to listeners on the
/// way. Listeners run inside `invoke` and must not invoke through the same
/// bridge.
pub struct StreamBridge<R, W> {
    connection: Mutex<Connection<R, W>>,
    listeners: ListenerTable,
}

impl<R: Read, W: Write> StreamBridge<R, W> {
    pub fn new(reader: FrameReader<R>, writer: FrameWriter<W>) -> Self {
        Self {
            connection: Mutex::new(Connection {
                reader,
                writer,
                next_seq: 1,
            }),
            listeners: ListenerTable::new(),
        }
    }

    pub fn listeners(&self) -> &ListenerTable {
        &self.listeners
    }

    fn round_trip(
        &self,
        channel: &str,
        args: Option<Value>,
        call_id: Option<CallId>,
    ) -> Result<Envelope, BridgeError> {
        let mut conn = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let seq = conn.next_seq;
        conn.next_seq += 1;

        conn.writer
            .write_message(&WireMessage::Invoke(InvokeMessage {
                seq,
                channel: channel.to_string(),
                args,
                call_id,
            }))
            .map_err(gone_if_disconnected)?;
        tracing::debug!(channel, seq, ?call_id, "invocation sent");

        // Keep reading through a violation so the connection stays in step.
        let mut violation = None;
        loop {
            match conn.reader.read_message().map_err(gone_if_disconnected)? {
                WireMessage::Event(event) => {
                    if let Err(err) = self.listeners.dispatch(&event.stream, &event.envelope) {
                        violation.get_or_insert(err);
                    }
                }
                WireMessage::Response(response) if response.seq == seq => {
                    return match violation {
                        Some(err) => Err(err.into()),
                        None => Ok(response.envelope),
                    };
                }
                WireMessage::Rejected(rejected) if rejected.seq == seq => {
                    tracing::warn!(channel, seq, code = %rejected.code, "invocation rejected");
                    return Err(BridgeError::Rejected {
                        code: rejected.code,
                        reason: rejected.reason,
                    });
                }
                WireMessage::Response(response) => {
                    tracing::warn!(seq = response.seq, "dropping response for another invocation");
                }
                WireMessage::Rejected(rejected) => {
                    tracing::warn!(seq = rejected.seq, "dropping rejection for another invocation");
                }
                WireMessage::Invoke(_) => return Err(BridgeError::UnexpectedMessage("INVOKE")),
            }
        }
    }
}

fn gone_if_disconnected(err: FrameError) -> BridgeError {
    if err.is_disconnect() {
        BridgeError::DestinationGone
    } else {
        BridgeError::Frame(err)
    }
}

impl<R, W> Bridge for StreamBridge<R, W>
where
    R: Read + Send,
    W: Write + Send,
{
    fn invoke(
        &self,
        channel: &str,
        args: Option<Value>,
        call_id: Option<CallId>,
    ) -> Result<Envelope, BridgeError> {
        self.round_trip(channel, args, call_id)
    }

    fn on(&self, stream: &str, listener: Listener) -> ListenerId {
        self.listeners.add(stream, listener)
    }

    fn remove_listener(&self, stream: &str, id: ListenerId) -> bool {
        self.listeners.remove(stream, id)
    }
}

#[cfg(unix)]
impl StreamBridge<std::os::unix::net::UnixStream, std::os::unix::net::UnixStream> {
    /// Wrap a connected Unix stream.
    pub fn from_unix(
        stream: std::os::unix::net::UnixStream,
        config: FrameConfig,
    ) -> Result<Self, BridgeError> {
        let reader_stream = stream.try_clone().map_err(FrameError::from)?;
        let reader = FrameReader::with_config_unix(reader_stream, config.clone())?;
        let writer = FrameWriter::with_config_unix(stream, config)?;
        Ok(Self::new(reader, writer))
    }

    /// Connect to a backend listening on `path`.
    pub fn connect_unix(
        path: impl AsRef<std::path::Path>,
        config: FrameConfig,
    ) -> Result<Self, BridgeError> {
        let stream = std::os::unix::net::UnixStream::connect(path).map_err(|err| {
            gone_if_disconnected(FrameError::from(err))
        })?;
        Self::from_unix(stream, config)
    }
}

impl<R, W> std::fmt::Debug for StreamBridge<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBridge")
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}
