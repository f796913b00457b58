use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use superipc::demo;
use superipc_backend::{serve_unix, ChannelRegistry};
use superipc_core::ProtocolConfig;
use superipc_frame::FrameConfig;

use crate::cmd::ServeArgs;
use crate::exit::{io_error, CliError, CliResult, INTERNAL, SUCCESS};

const ACCEPT_POLL: Duration = Duration::from_millis(25);

/// Bound socket whose file is removed when serving stops.
struct BoundSocket {
    listener: UnixListener,
    path: PathBuf,
}

impl BoundSocket {
    fn bind(path: &Path) -> io::Result<Self> {
        // Replace a stale socket, never any other kind of file.
        if let Ok(metadata) = std::fs::symlink_metadata(path) {
            if !metadata.file_type().is_socket() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                ));
            }
            tracing::debug!(path = %path.display(), "removing stale socket");
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for BoundSocket {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let config = ProtocolConfig::default().with_max_call_id(args.max_call_id);
    let mut registry = ChannelRegistry::with_config(config);
    demo::register(&mut registry)
        .map_err(|err| CliError::new(INTERNAL, format!("registration failed: {err}")))?;
    let registry = Arc::new(registry);

    let socket = BoundSocket::bind(&args.path).map_err(|err| io_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    tracing::info!(
        path = %args.path.display(),
        channels = ?registry.channels(),
        "serving"
    );

    let mut connections = Connections::default();
    let outcome = accept_loop(&socket, &registry, &running, args.connections, &mut connections);
    connections.join_all();
    outcome.map(|()| SUCCESS)
}

/// Threads serving accepted connections.
#[derive(Default)]
struct Connections {
    served: usize,
    handles: Vec<JoinHandle<()>>,
}

impl Connections {
    fn spawn(&mut self, registry: &Arc<ChannelRegistry>, stream: UnixStream) {
        self.served += 1;
        let registry = Arc::clone(registry);
        let connection = self.served;
        self.handles
            .push(thread::spawn(move || serve_one(&registry, stream, connection)));
    }

    /// Join threads whose connection has already closed.
    fn reap(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) =
            self.handles.drain(..).partition(|handle| handle.is_finished());
        self.handles = running;
        for handle in finished {
            join(handle);
        }
    }

    fn join_all(&mut self) {
        if self.open() > 0 {
            tracing::debug!(open = self.open(), "waiting for open connections");
        }
        for handle in self.handles.drain(..) {
            join(handle);
        }
    }

    fn open(&self) -> usize {
        self.handles.len()
    }
}

fn join(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        tracing::error!("connection thread panicked");
    }
}

fn accept_loop(
    socket: &BoundSocket,
    registry: &Arc<ChannelRegistry>,
    running: &AtomicBool,
    limit: Option<usize>,
    connections: &mut Connections,
) -> CliResult<()> {
    while running.load(Ordering::SeqCst) {
        connections.reap();
        let stream = match socket.listener.accept() {
            Ok((stream, _)) => stream,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
                continue;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_error("accept failed", err)),
        };
        stream
            .set_nonblocking(false)
            .map_err(|err| io_error("accept failed", err))?;

        connections.spawn(registry, stream);
        if limit.is_some_and(|limit| connections.served >= limit) {
            break;
        }
    }
    Ok(())
}

fn serve_one(registry: &ChannelRegistry, stream: UnixStream, connection: usize) {
    tracing::debug!(connection, "connection accepted");
    match serve_unix(registry, stream, FrameConfig::default()) {
        Ok(stats) => tracing::info!(
            connection,
            invocations = stats.invocations,
            rejected = stats.rejected,
            events = stats.events,
            skipped = stats.skipped,
            "connection closed"
        ),
        Err(err) => tracing::warn!(connection, error = %err, "connection failed"),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use superipc_client::{Bridge, StreamBridge};

    use super::*;

    fn temp_socket(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sipc-serve-{tag}-{}.sock", std::process::id()))
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let start = Instant::now();
        while !done() {
            assert!(start.elapsed() < Duration::from_secs(3), "condition never held");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn closed_connections_are_reaped() {
        let path = temp_socket("reap");
        let socket = BoundSocket::bind(&path).expect("socket should bind");
        let registry = Arc::new(demo::registry().expect("demo channels should register"));
        let mut connections = Connections::default();

        for _ in 0..3 {
            let client = UnixStream::connect(&path).expect("client should connect");
            let stream = loop {
                match socket.listener.accept() {
                    Ok((stream, _)) => break stream,
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(err) => panic!("accept failed: {err}"),
                }
            };
            stream.set_nonblocking(false).unwrap();
            connections.spawn(&registry, stream);
            drop(client);
        }

        wait_until(|| {
            connections.reap();
            connections.open() == 0
        });
        assert_eq!(connections.served, 3);
    }

    #[test]
    fn stopping_waits_for_open_connections() {
        let path = temp_socket("stop");
        let socket = BoundSocket::bind(&path).expect("socket should bind");
        let registry = Arc::new(demo::registry().expect("demo channels should register"));
        let running = AtomicBool::new(true);
        let mut connections = Connections::default();

        thread::scope(|scope| {
            let client = scope.spawn(|| {
                let bridge = StreamBridge::connect_unix(&path, FrameConfig::default())
                    .expect("client should connect");
                let ack = bridge
                    .invoke("ping", Some(serde_json::json!(1)), None)
                    .expect("ping should answer");
                running.store(false, Ordering::SeqCst);
                ack
            });

            accept_loop(&socket, &registry, &running, None, &mut connections)
                .expect("accept loop should stop cleanly");
            assert_eq!(connections.served, 1);

            let ack = client.join().expect("client thread should finish");
            assert_eq!(ack.content.as_deref(), Some("1"));
            connections.join_all();
            assert_eq!(connections.open(), 0);
        });

        drop(socket);
        assert!(!path.exists());
    }
}
