/// Upper bound (exclusive) of the call identifier space.
pub const DEFAULT_MAX_CALL_ID: u32 = 100_000;

/// Protocol-level settings shared by both ends of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Call identifiers are drawn from `[0, max_call_id)`.
    pub max_call_id: u32,
}

impl ProtocolConfig {
    /// Override the call identifier bound.
    pub fn with_max_call_id(mut self, max_call_id: u32) -> Self {
        self.max_call_id = max_call_id;
        self
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_call_id: DEFAULT_MAX_CALL_ID,
        }
    }
}
