//! In-process async channel with progress reporting.
//!
//! ```bash
//! cargo run -p superipc --example progress
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use superipc::backend::ChannelRegistry;
use superipc::client::{Client, ReplyDemultiplexer};
use superipc::protocol::{AppError, AsyncApi};
use superipc::LocalBridge;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Job {
    name: String,
    steps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Step {
    done: u32,
    total: u32,
}

struct RunJob;

impl AsyncApi for RunJob {
    const CHANNEL: &'static str = "run-job";
    type Props = Job;
    type Init = String;
    type Progress = Step;
    type Complete = String;
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = ChannelRegistry::new();
    registry.register_async::<RunJob, _>(|job, emit| {
        if job.steps == 0 {
            return Err(AppError::new("job has no steps"));
        }
        emit.on_init(format!("starting {}", job.name));
        for done in 1..=job.steps {
            emit.on_progress(Step {
                done,
                total: job.steps,
            });
        }
        Ok(Some(format!("{} finished", job.name)))
    })?;

    let client = Client::new(Arc::new(LocalBridge::new(Arc::new(registry))));
    let demux = ReplyDemultiplexer::<RunJob>::new()
        .on_init(|message| println!("init: {message}"))
        .on_progress(|step| println!("progress: {}/{}", step.done, step.total))
        .on_complete(|message| println!("complete: {message}"));
    let mut call = client.async_call_with(demux);

    call.start(&Job {
        name: "index".to_string(),
        steps: 3,
    })?;
    call.start(&Job {
        name: "empty".to_string(),
        steps: 0,
    })?;
    if let Some(err) = call.error() {
        println!("error: {err}");
    }

    Ok(())
}
