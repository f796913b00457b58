//! Channels served by `superipc serve`.

use serde_json::Value;
use superipc_backend::{ChannelRegistry, RegistrationError};
use superipc_core::{AppError, AsyncApi, SyncApi};

/// Echoes its arguments.
pub struct Ping;

impl SyncApi for Ping {
    const CHANNEL: &'static str = "ping";
    type Props = Value;
    type Output = Value;
}

/// Reports `1..n` as progress and completes with `n`.
pub struct Count;

impl AsyncApi for Count {
    const CHANNEL: &'static str = "count";
    type Props = u32;
    type Init = ();
    type Progress = u32;
    type Complete = u32;
}

/// Always fails with its argument as the message.
pub struct Fail;

impl SyncApi for Fail {
    const CHANNEL: &'static str = "fail";
    type Props = String;
    type Output = ();
}

pub fn registry() -> Result<ChannelRegistry, RegistrationError> {
    let mut registry = ChannelRegistry::new();
    register(&mut registry)?;
    Ok(registry)
}

pub fn register(registry: &mut ChannelRegistry) -> Result<(), RegistrationError> {
    registry
        .register_sync::<Ping, _>(|args| Ok(args))?
        .register_async::<Count, _>(|upto, emit| {
            for n in 1..upto {
                emit.on_progress(n);
            }
            Ok(Some(upto))
        })?
        .register_sync::<Fail, _>(|reason| Err(AppError::new(reason)))?;
    Ok(())
}
