use clap::{Args, Subcommand};
use std::path::PathBuf;

use superipc_core::DEFAULT_MAX_CALL_ID;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod call;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the demo channels on a Unix socket.
    Serve(ServeArgs),
    /// Invoke a channel and print its envelopes.
    Call(CallArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Call(args) => call::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Upper bound (exclusive) for call ids the backend accepts or allocates.
    #[arg(long, env = "SUPERIPC_MAX_CALL_ID", default_value_t = DEFAULT_MAX_CALL_ID)]
    pub max_call_id: u32,
    /// Exit after serving N connections.
    #[arg(long)]
    pub connections: Option<usize>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Channel to invoke.
    pub channel: String,
    /// JSON arguments.
    #[arg(long)]
    pub json: Option<String>,
    /// Treat the channel as asynchronous and print its reply stream.
    #[arg(long = "async")]
    pub async_call: bool,
    /// Call id to tag the asynchronous call with.
    #[arg(long, requires = "async_call")]
    pub call_id: Option<u32>,
    /// Upper bound (exclusive) for call ids picked by this client.
    #[arg(long, env = "SUPERIPC_MAX_CALL_ID", default_value_t = DEFAULT_MAX_CALL_ID)]
    pub max_call_id: u32,
    /// Maximum time to wait when sending to the backend (e.g. 5s, 500ms).
    /// Replies and reply stream events are awaited without a deadline.
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
