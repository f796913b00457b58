use serde_json::{json, Value};
use superipc_backend::{ChannelKind, ChannelRegistry, DispatchError, Emitter, MemorySink};
use superipc_core::{AppError, Envelope, ProtocolConfig, ResultMode};

fn registry() -> ChannelRegistry {
    let mut registry = ChannelRegistry::with_config(ProtocolConfig::default().with_max_call_id(8));
    registry
        .register_sync_fn("add", |pair: (i64, i64)| Ok(pair.0 + pair.1))
        .expect("add should register")
        .register_async_fn("upload", |files: Vec<String>, emit: &Emitter<'_, usize, String, ()>| {
            emit.on_init(files.len());
            for file in files {
                emit.on_progress(file);
            }
            Ok(None)
        })
        .expect("upload should register")
        .register_async_fn("crash", |_: Value, emit: &Emitter<'_, (), u8, ()>| {
            emit.on_progress(1);
            panic!("worker died")
        })
        .expect("crash should register");
    registry
}

#[test]
fn sync_dispatch_returns_complete_envelope() {
    let registry = registry();
    let sink = MemorySink::new();

    let envelope = registry
        .dispatch("add", Some(json!([2, 3])), None, &sink)
        .expect("add should dispatch");

    assert_eq!(envelope, Envelope::content(ResultMode::Complete, "5", None));
    assert!(sink.is_empty());
}

#[test]
fn invalid_arguments_become_error_envelope() {
    let registry = registry();
    let sink = MemorySink::new();

    let envelope = registry
        .dispatch("add", Some(json!("two")), None, &sink)
        .expect("add should dispatch");

    assert_eq!(envelope.result_mode, ResultMode::Complete);
    let err = AppError::from_json(envelope.error.as_deref().unwrap()).unwrap();
    assert!(err.message.contains("add"));
}

#[test]
fn async_dispatch_streams_in_order() {
    let registry = registry();
    let sink = MemorySink::new();

    let ack = registry
        .dispatch("upload", Some(json!(["a", "b"])), Some(4), &sink)
        .expect("upload should dispatch");
    assert_eq!(ack, Envelope::empty_complete(Some(4)));

    let delivered = sink.drain();
    assert!(delivered.iter().all(|(stream, _)| stream == "upload-ASYNC_REPLY"));
    let envelopes: Vec<Envelope> = delivered.into_iter().map(|(_, envelope)| envelope).collect();
    assert_eq!(
        envelopes,
        [
            Envelope::content(ResultMode::Init, "2", Some(4)),
            Envelope::content(ResultMode::Progress, "\"a\"", Some(4)),
            Envelope::content(ResultMode::Progress, "\"b\"", Some(4)),
            Envelope::empty_complete(Some(4)),
        ]
    );
}

#[test]
fn panicking_handler_still_terminates_the_call() {
    let registry = registry();
    let sink = MemorySink::new();

    registry
        .dispatch("crash", None, Some(2), &sink)
        .expect("crash should dispatch");

    let envelopes: Vec<Envelope> = sink.drain().into_iter().map(|(_, envelope)| envelope).collect();
    assert_eq!(envelopes.len(), 2);
    assert_eq!(envelopes[0].result_mode, ResultMode::Progress);
    assert!(envelopes[1].is_terminal());
    let err = AppError::from_json(envelopes[1].error.as_deref().unwrap()).unwrap();
    assert!(err.message.contains("worker died"));
}

#[test]
fn out_of_range_call_id_is_refused() {
    let registry = registry();
    let sink = MemorySink::new();

    let err = registry
        .dispatch("upload", Some(json!([])), Some(8), &sink)
        .unwrap_err();

    assert!(matches!(err, DispatchError::InvalidCallId { call_id: 8, max: 8, .. }));
    assert!(sink.is_empty());
}

#[test]
fn closed_sink_drops_reply_events() {
    let registry = registry();
    let sink = MemorySink::new();
    sink.close();

    let ack = registry
        .dispatch("upload", Some(json!(["a"])), Some(1), &sink)
        .expect("ack is still produced");

    assert_eq!(ack, Envelope::empty_complete(Some(1)));
    assert!(sink.is_empty());
}

#[test]
fn registry_reports_channel_kinds() {
    let registry = registry();

    assert_eq!(registry.channels(), ["add", "crash", "upload"]);
    assert_eq!(registry.kind("add"), Some(ChannelKind::Sync));
    assert_eq!(registry.kind("upload"), Some(ChannelKind::Async));
    assert!(matches!(
        registry.dispatch("nope", None, None, &MemorySink::new()),
        Err(DispatchError::UnknownChannel(name)) if name == "nope"
    ));
}
