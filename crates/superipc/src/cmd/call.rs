use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use superipc_client::{Client, Delivery, ReplyDemultiplexer, StreamBridge, Subscription};
use superipc_core::{reply_stream_name, AsyncApi, Envelope, ProtocolConfig};
use superipc_frame::FrameConfig;

use crate::cmd::CallArgs;
use crate::exit::{bridge_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_envelopes, OutputFormat};

/// Contract for channels only known by name at runtime.
struct Untyped;

impl AsyncApi for Untyped {
    const CHANNEL: &'static str = "<untyped>";
    type Props = Value;
    type Init = Value;
    type Progress = Value;
    type Complete = Value;
}

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let call_args = parse_json(args.json.as_deref())?;
    let timeout = parse_duration(&args.timeout)?;
    let config = frame_config(timeout);

    let bridge = StreamBridge::connect_unix(&args.path, config)
        .map_err(|err| bridge_error("connect failed", err))?;
    let protocol = ProtocolConfig::default().with_max_call_id(args.max_call_id);
    let client = Client::with_config(Arc::new(bridge), &protocol);

    if !args.async_call {
        let envelope = client
            .invoke_raw(&args.channel, call_args, None)
            .map_err(|err| bridge_error("call failed", err))?;
        print_envelopes(&args.channel, std::slice::from_ref(&envelope), format);
        return Ok(exit_code(&envelope));
    }

    let call_id = match args.call_id {
        Some(id) => client.call_ids().claim(id),
        None => client.call_ids().allocate(),
    }
    .map_err(|err| CliError::new(USAGE, format!("invalid call id: {err}")))?;

    let stream = reply_stream_name(&args.channel);
    let mut demux = ReplyDemultiplexer::<Untyped>::new();
    demux.reset(call_id);
    let demux = Arc::new(Mutex::new(demux));
    let received = Arc::new(Mutex::new(Vec::new()));

    let mut subscription = Subscription::new(Arc::clone(client.bridge()), stream.clone());
    {
        let demux = Arc::clone(&demux);
        let received = Arc::clone(&received);
        subscription.resubscribe(Box::new(move |envelope| {
            let mut demux = demux.lock().unwrap_or_else(PoisonError::into_inner);
            if demux.handle(envelope)? != Delivery::Ignored {
                received
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(envelope.clone());
            }
            Ok(())
        }));
    }

    let answer = client.invoke_raw(&args.channel, call_args, Some(call_id));
    let events = std::mem::take(&mut *received.lock().unwrap_or_else(PoisonError::into_inner));
    print_envelopes(&stream, &events, format);

    let ack = answer.map_err(|err| bridge_error("call failed", err))?;
    client.call_ids().release(call_id);
    if ack.is_error() {
        print_envelopes(&args.channel, std::slice::from_ref(&ack), format);
        return Ok(FAILURE);
    }

    let settled = demux
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .is_settled();
    if !settled {
        tracing::warn!(channel = %args.channel, call_id, "call did not settle");
        return Ok(FAILURE);
    }
    Ok(events.last().map_or(FAILURE, exit_code))
}

/// Reply streams have no latency bound, so only writes are timed.
fn frame_config(write_timeout: Duration) -> FrameConfig {
    FrameConfig {
        read_timeout: None,
        write_timeout: Some(write_timeout),
        ..FrameConfig::default()
    }
}

fn exit_code(envelope: &Envelope) -> i32 {
    if envelope.is_error() {
        FAILURE
    } else {
        SUCCESS
    }
}

fn parse_json(input: Option<&str>) -> CliResult<Option<Value>> {
    input
        .map(|json| {
            serde_json::from_str(json)
                .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))
        })
        .transpose()
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };
    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
