use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use superipc_core::Envelope;

use crate::error::SinkError;

/// Destination for envelopes pushed onto reply streams.
///
/// Implementations must preserve per-stream FIFO order.
pub trait ReplySink: Send + Sync {
    /// Deliver `envelope` on `stream`.
    ///
    /// Returns [`SinkError::DestinationGone`] once the receiving end has been
    /// torn down.
    fn send(&self, stream: &str, envelope: &Envelope) -> Result<(), SinkError>;
}

/// In-memory reply sink that queues envelopes until drained.
#[derive(Debug, Default)]
pub struct MemorySink {
    queue: Mutex<VecDeque<(String, Envelope)>>,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tear down the receiving end. Later sends fail with `DestinationGone`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Take every queued `(stream, envelope)` pair in delivery order.
    pub fn drain(&self) -> Vec<(String, Envelope)> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.drain(..).collect()
    }

    /// Take the oldest queued pair.
    pub fn pop(&self) -> Option<(String, Envelope)> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.pop_front()
    }

    pub fn len(&self) -> usize {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReplySink for MemorySink {
    fn send(&self, stream: &str, envelope: &Envelope) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::DestinationGone);
        }
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.push_back((stream.to_string(), envelope.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use superipc_core::ResultMode;

    use super::*;

    #[test]
    fn queues_in_order() {
        let sink = MemorySink::new();
        sink.send("a", &Envelope::content(ResultMode::Progress, "1", Some(1)))
            .unwrap();
        sink.send("a", &Envelope::content(ResultMode::Complete, "2", Some(1)))
            .unwrap();

        let drained = sink.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].1.content.as_deref(), Some("1"));
        assert_eq!(drained[1].1.content.as_deref(), Some("2"));
        assert!(sink.is_empty());
    }

    #[test]
    fn closed_sink_reports_destination_gone() {
        let sink = MemorySink::new();
        sink.close();
        let err = sink
            .send("a", &Envelope::empty_complete(Some(1)))
            .unwrap_err();
        assert!(matches!(err, SinkError::DestinationGone));
        assert!(sink.pop().is_none());
    }
}
