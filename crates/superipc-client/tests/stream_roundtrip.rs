#![cfg(unix)]

use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;

use serde::{Deserialize, Serialize};
use superipc_backend::{serve_unix, ChannelRegistry};
use superipc_client::{BridgeError, Client, ClientError, StreamBridge};
use superipc_core::{AppError, AsyncApi, SyncApi};
use superipc_frame::FrameConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Point {
    x: i64,
}

struct Echo;
impl SyncApi for Echo {
    const CHANNEL: &'static str = "echo";
    type Props = Point;
    type Output = Point;
}

struct Fail;
impl SyncApi for Fail {
    const CHANNEL: &'static str = "fail";
    type Props = String;
    type Output = ();
}

struct Download;
impl AsyncApi for Download {
    const CHANNEL: &'static str = "download";
    type Props = u32;
    type Init = String;
    type Progress = u32;
    type Complete = String;
}

struct Missing;
impl SyncApi for Missing {
    const CHANNEL: &'static str = "missing";
    type Props = ();
    type Output = ();
}

fn registry() -> ChannelRegistry {
    let mut registry = ChannelRegistry::new();
    registry
        .register_sync::<Echo, _>(|point| Ok(point))
        .expect("echo should register")
        .register_sync::<Fail, _>(|reason| Err(AppError::new(reason)))
        .expect("fail should register")
        .register_async::<Download, _>(|chunks, emit| {
            emit.on_init("started".to_string());
            for chunk in 1..=chunks {
                emit.on_progress(chunk * 10);
            }
            Ok(Some(format!("{chunks} chunks")))
        })
        .expect("download should register");
    registry
}

/// Serve `registry` on one end of a socket pair and run `body` against a
/// client connected to the other end.
fn with_client(body: impl FnOnce(Client<StreamBridge<UnixStream, UnixStream>>)) {
    let registry = registry();
    let (server, client) = UnixStream::pair().expect("socket pair should open");

    thread::scope(|scope| {
        let host = scope.spawn(|| serve_unix(&registry, server, FrameConfig::default()));
        let bridge = StreamBridge::from_unix(client, FrameConfig::default())
            .expect("bridge should wrap stream");
        body(Client::new(Arc::new(bridge)));
        host.join()
            .expect("host thread should finish")
            .expect("serve should end cleanly");
    });
}

#[test]
fn sync_echo_over_socket() {
    with_client(|client| {
        let mut echo = client.sync_call::<Echo>();
        let outcome = echo.fetch(&Point { x: 1 }).expect("fetch should answer");
        assert_eq!(outcome.data, Some(Point { x: 1 }));
        assert!(outcome.error.is_none());
    });
}

#[test]
fn sync_failure_arrives_as_error_envelope() {
    with_client(|client| {
        let outcome = client
            .call::<Fail>(&"disk full".to_string())
            .expect("call should answer");
        assert!(outcome.data.is_none());
        assert_eq!(outcome.error.map(|e| e.message().to_string()), Some("disk full".to_string()));
    });
}

#[test]
fn async_download_reports_every_phase() {
    with_client(|client| {
        let mut download = client.async_call::<Download>();
        let ack = download.start(&3).expect("start should answer");

        assert_eq!(ack.call_id, download.call_id());
        assert_eq!(download.initial_data().as_deref(), Some("started"));
        assert_eq!(download.progress_data(), [10, 20, 30]);
        assert_eq!(download.complete_data().as_deref(), Some("3 chunks"));
        assert!(!download.loading());
        assert_eq!(client.call_ids().in_flight(), 1);

        drop(download);
        assert_eq!(client.call_ids().in_flight(), 0);
    });
}

#[test]
fn concurrent_call_sites_stay_isolated() {
    with_client(|client| {
        let mut first = client.async_call::<Download>();
        let mut second = client.async_call::<Download>();

        first.start(&1).expect("first should answer");
        second.start(&2).expect("second should answer");

        assert_ne!(first.call_id(), second.call_id());
        assert_eq!(first.progress_data(), [10]);
        assert_eq!(second.progress_data(), [10, 20]);
        assert_eq!(first.complete_data().as_deref(), Some("1 chunks"));
    });
}

#[test]
fn unknown_channel_is_rejected() {
    with_client(|client| {
        let err = client.call::<Missing>(&()).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Bridge(BridgeError::Rejected { ref code, .. }) if code == "HANDLER_NOT_FOUND"
        ));
    });
}
