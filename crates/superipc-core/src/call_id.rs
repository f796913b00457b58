use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::config::ProtocolConfig;
use crate::error::CallIdError;

/// Correlation token for one logical invocation of an asynchronous channel.
pub type CallId = u32;

/// Hands out call identifiers that are unique among calls in flight.
///
/// Identifiers come from a monotonically advancing cursor over
/// `[0, max_call_id)` that wraps around and skips identifiers still in
/// flight. Uniqueness holds for this allocator only; two processes with
/// their own allocators may still hand out the same value.
#[derive(Debug)]
pub struct CallIdAllocator {
    max_call_id: u32,
    state: Mutex<AllocatorState>,
}

#[derive(Debug, Default)]
struct AllocatorState {
    cursor: u32,
    in_flight: HashSet<CallId>,
}

impl CallIdAllocator {
    /// Allocator over `[0, max_call_id)`. A zero bound is raised to one.
    pub fn new(max_call_id: u32) -> Self {
        Self {
            max_call_id: max_call_id.max(1),
            state: Mutex::new(AllocatorState::default()),
        }
    }

    pub fn with_config(config: &ProtocolConfig) -> Self {
        Self::new(config.max_call_id)
    }

    /// Reserve the next free identifier.
    pub fn allocate(&self) -> Result<CallId, CallIdError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.in_flight.len() >= self.max_call_id as usize {
            return Err(CallIdError::Exhausted {
                in_flight: state.in_flight.len(),
            });
        }

        loop {
            let candidate = state.cursor;
            state.cursor = (state.cursor + 1) % self.max_call_id;
            if state.in_flight.insert(candidate) {
                tracing::trace!(call_id = candidate, "allocated call id");
                return Ok(candidate);
            }
        }
    }

    /// Reserve a specific identifier chosen by the peer.
    pub fn claim(&self, call_id: CallId) -> Result<CallId, CallIdError> {
        if call_id >= self.max_call_id {
            return Err(CallIdError::OutOfRange {
                call_id,
                max: self.max_call_id,
            });
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.in_flight.insert(call_id) {
            return Err(CallIdError::InFlight(call_id));
        }
        Ok(call_id)
    }

    /// Return an identifier to the pool. Returns false if it was not in flight.
    pub fn release(&self, call_id: CallId) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_flight.remove(&call_id)
    }

    pub fn is_in_flight(&self, call_id: CallId) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_flight.contains(&call_id)
    }

    pub fn in_flight(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.in_flight.len()
    }

    pub fn max_call_id(&self) -> u32 {
        self.max_call_id
    }
}

impl Default for CallIdAllocator {
    fn default() -> Self {
        Self::with_config(&ProtocolConfig::default())
    }
}
