use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use superipc_core::Envelope;
use superipc_frame::kind::kind_name;
use superipc_frame::{
    EventMessage, FrameConfig, FrameError, FrameReader, FrameWriter, InvokeMessage,
    RejectedMessage, ResponseMessage, WireMessage,
};

use crate::error::{ServeError, SinkError};
use crate::registry::ChannelRegistry;
use crate::sink::ReplySink;

/// Counters for one served connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    /// Invocations answered with a response.
    pub invocations: u64,
    /// Invocations refused before a handler ran.
    pub rejected: u64,
    /// Envelopes pushed onto reply streams.
    pub events: u64,
    /// Frames skipped because they were unreadable or unexpected.
    pub skipped: u64,
}

/// Reply sink writing `EVENT` frames to the connection.
struct FrameSink<W> {
    writer: Mutex<FrameWriter<W>>,
    gone: AtomicBool,
    events: AtomicU64,
}

impl<W: Write + Send> FrameSink<W> {
    fn new(writer: FrameWriter<W>) -> Self {
        Self {
            writer: Mutex::new(writer),
            gone: AtomicBool::new(false),
            events: AtomicU64::new(0),
        }
    }

    fn write(&self, message: &WireMessage) -> Result<(), FrameError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let result = writer.write_message(message);
        if matches!(&result, Err(err) if err.is_disconnect()) {
            self.gone.store(true, Ordering::SeqCst);
        }
        result
    }
}

impl<W: Write + Send> ReplySink for FrameSink<W> {
    fn send(&self, stream: &str, envelope: &Envelope) -> Result<(), SinkError> {
        if self.gone.load(Ordering::SeqCst) {
            return Err(SinkError::DestinationGone);
        }

        let message = WireMessage::Event(EventMessage {
            stream: stream.to_string(),
            envelope: envelope.clone(),
        });
        match self.write(&message) {
            Ok(()) => {
                self.events.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) if err.is_disconnect() => Err(SinkError::DestinationGone),
            Err(err) => Err(err.into()),
        }
    }
}

/// Serve invocations arriving on `reader` until the peer hangs up.
///
/// Each `INVOKE` is dispatched through `registry` and answered on `writer`
/// with a `RESPONSE`, or a `REJECTED` when the registry refuses it. Reply
/// stream envelopes produced while the handler runs are written as `EVENT`
/// frames ahead of the response.
pub fn serve_connection<R, W>(
    registry: &ChannelRegistry,
    reader: &mut FrameReader<R>,
    writer: FrameWriter<W>,
) -> Result<ServeStats, ServeError>
where
    R: Read,
    W: Write + Send,
{
    let sink = FrameSink::new(writer);
    let mut stats = ServeStats::default();

    loop {
        let message = match reader.read_message() {
            Ok(message) => message,
            Err(err) if err.is_disconnect() => {
                tracing::debug!("peer disconnected");
                break;
            }
            Err(err @ (FrameError::Malformed { .. } | FrameError::UnknownKind { .. })) => {
                tracing::warn!(error = %err, "skipping unreadable frame");
                stats.skipped += 1;
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let invoke = match message {
            WireMessage::Invoke(invoke) => invoke,
            other => {
                tracing::warn!(kind = kind_name(other.kind()), "ignoring unexpected message");
                stats.skipped += 1;
                continue;
            }
        };

        let reply = answer(registry, invoke, &sink, &mut stats);
        match sink.write(&reply) {
            Ok(()) => {}
            Err(err) if err.is_disconnect() => {
                tracing::debug!("peer disconnected before response");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }

    stats.events = sink.events.load(Ordering::Relaxed);
    Ok(stats)
}

fn answer<W: Write + Send>(
    registry: &ChannelRegistry,
    invoke: InvokeMessage,
    sink: &FrameSink<W>,
    stats: &mut ServeStats,
) -> WireMessage {
    let InvokeMessage {
        seq,
        channel,
        args,
        call_id,
    } = invoke;

    match registry.dispatch(&channel, args, call_id, sink) {
        Ok(envelope) => {
            stats.invocations += 1;
            WireMessage::Response(ResponseMessage { seq, envelope })
        }
        Err(err) => {
            tracing::warn!(channel = %channel, seq, error = %err, "rejected invocation");
            stats.rejected += 1;
            WireMessage::Rejected(RejectedMessage {
                seq,
                code: err.code().to_string(),
                reason: err.to_string(),
            })
        }
    }
}

/// Serve one accepted Unix socket connection.
#[cfg(unix)]
pub fn serve_unix(
    registry: &ChannelRegistry,
    stream: std::os::unix::net::UnixStream,
    config: FrameConfig,
) -> Result<ServeStats, ServeError> {
    let reader_stream = stream.try_clone()?;
    let mut reader = FrameReader::with_config_unix(reader_stream, config.clone())?;
    let writer = FrameWriter::with_config_unix(stream, config)?;
    serve_connection(registry, &mut reader, writer)
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::thread;

    use serde_json::{json, Value};
    use superipc_core::ResultMode;
    use superipc_frame::Header;

    use super::*;

    fn registry() -> ChannelRegistry {
        let mut registry = ChannelRegistry::new();
        registry
            .register_sync_fn("ping", |v: Value| Ok(v))
            .expect("ping should register")
            .register_async_fn("count", |n: u32, emit: &crate::Emitter<'_, (), u32, u32>| {
                for i in 1..n {
                    emit.on_progress(i);
                }
                Ok(Some(n))
            })
            .expect("count should register");
        registry
    }

    fn invoke(seq: u64, channel: &str, args: Value, call_id: Option<u32>) -> WireMessage {
        WireMessage::Invoke(InvokeMessage {
            seq,
            channel: channel.to_string(),
            args: Some(args),
            call_id,
        })
    }

    #[test]
    fn answers_sync_and_async_invocations() {
        let registry = registry();
        let (server, client) = UnixStream::pair().expect("socket pair should open");

        thread::scope(|scope| {
            let host = scope.spawn(|| serve_unix(&registry, server, FrameConfig::default()));

            let mut writer = FrameWriter::new(client.try_clone().expect("clone should work"));
            let mut reader = FrameReader::new(client);

            writer
                .write_message(&invoke(1, "ping", json!({ "x": 1 }), None))
                .expect("invoke should send");
            let WireMessage::Response(response) = reader.read_message().expect("response") else {
                panic!("expected response");
            };
            assert_eq!(response.seq, 1);
            assert_eq!(response.envelope.content.as_deref(), Some(r#"{"x":1}"#));

            writer
                .write_message(&invoke(2, "count", json!(3), Some(7)))
                .expect("invoke should send");
            let mut events = Vec::new();
            let ack = loop {
                match reader.read_message().expect("message should arrive") {
                    WireMessage::Event(event) => events.push(event),
                    WireMessage::Response(response) => break response,
                    other => panic!("unexpected message: {other:?}"),
                }
            };
            assert_eq!(ack.seq, 2);
            assert_eq!(ack.envelope, Envelope::empty_complete(Some(7)));
            let modes: Vec<ResultMode> =
                events.iter().map(|event| event.envelope.result_mode).collect();
            assert_eq!(
                modes,
                [ResultMode::Progress, ResultMode::Progress, ResultMode::Complete]
            );
            assert!(events.iter().all(|event| event.stream == "count-ASYNC_REPLY"));

            drop(writer);
            drop(reader);
            let stats = host
                .join()
                .expect("host thread should finish")
                .expect("serve should end cleanly");
            assert_eq!(stats.invocations, 2);
            assert_eq!(stats.events, 3);
            assert_eq!(stats.rejected, 0);
        });
    }

    #[test]
    fn rejects_unknown_channel_and_keeps_serving() {
        let registry = registry();
        let (server, client) = UnixStream::pair().expect("socket pair should open");

        thread::scope(|scope| {
            let host = scope.spawn(|| serve_unix(&registry, server, FrameConfig::default()));

            let mut writer = FrameWriter::new(client.try_clone().expect("clone should work"));
            let client_raw = client.try_clone().expect("clone should work");
            let mut reader = FrameReader::new(client);

            writer
                .write_message(&invoke(5, "missing", Value::Null, None))
                .expect("invoke should send");
            let WireMessage::Rejected(rejected) = reader.read_message().expect("reply") else {
                panic!("expected rejection");
            };
            assert_eq!(rejected.seq, 5);
            assert_eq!(rejected.code, "HANDLER_NOT_FOUND");

            let mut raw = client_raw;
            for (kind, payload) in [(superipc_frame::INVOKE, &b"not json"[..]), (42, &b"{}"[..])] {
                raw.write_all(&Header { kind, len: payload.len() }.to_bytes())
                    .and_then(|()| raw.write_all(payload))
                    .expect("raw frame should send");
            }
            writer
                .write_message(&invoke(6, "ping", json!(1), None))
                .expect("invoke should send");
            let WireMessage::Response(response) = reader.read_message().expect("reply") else {
                panic!("expected response");
            };
            assert_eq!(response.seq, 6);

            drop(raw);
            drop(writer);
            drop(reader);
            let stats = host
                .join()
                .expect("host thread should finish")
                .expect("serve should end cleanly");
            assert_eq!(stats.rejected, 1);
            assert_eq!(stats.skipped, 2);
            assert_eq!(stats.invocations, 1);
        });
    }
}
