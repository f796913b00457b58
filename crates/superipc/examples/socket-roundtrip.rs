//! Serve a registry on one end of a Unix socket pair and call it from the
//! other.
//!
//! ```bash
//! cargo run -p superipc --example socket-roundtrip
//! ```

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::net::UnixStream;
    use std::sync::Arc;

    use superipc::backend::serve_unix;
    use superipc::client::{Client, StreamBridge};
    use superipc::demo::{self, Count, Ping};
    use superipc::frame::FrameConfig;

    let registry = demo::registry()?;
    let (server, client_end) = UnixStream::pair()?;

    std::thread::scope(|scope| -> Result<(), Box<dyn std::error::Error>> {
        let host = scope.spawn(|| serve_unix(&registry, server, FrameConfig::default()));

        let bridge = StreamBridge::from_unix(client_end, FrameConfig::default())?;
        let client = Client::new(Arc::new(bridge));

        let echo = client.call::<Ping>(&serde_json::json!({ "hello": "world" }))?;
        println!("ping -> {:?}", echo.data);

        let mut count = client.async_call::<Count>();
        count.start(&4)?;
        println!(
            "count -> progress {:?}, complete {:?}",
            count.progress_data(),
            count.complete_data()
        );

        drop(count);
        drop(client);
        let stats = host.join().map_err(|_| "host thread panicked")??;
        println!("served {} invocations, {} events", stats.invocations, stats.events);
        Ok(())
    })
}

#[cfg(not(unix))]
fn main() {
    eprintln!("socket-roundtrip requires Unix domain sockets");
}
