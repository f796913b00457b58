//! Frame kinds.

/// Caller asks the backend to run a channel.
pub const INVOKE: u16 = 1;

/// Backend answers an invocation with its envelope.
pub const RESPONSE: u16 = 2;

/// Backend refuses an invocation before any handler ran.
pub const REJECTED: u16 = 3;

/// Backend pushes an envelope onto a reply stream.
pub const EVENT: u16 = 4;

/// Returns a human-readable name for a frame kind.
pub fn kind_name(kind: u16) -> &'static str {
    match kind {
        INVOKE => "INVOKE",
        RESPONSE => "RESPONSE",
        REJECTED => "REJECTED",
        EVENT => "EVENT",
        _ => "UNKNOWN",
    }
}

/// Returns true if the kind is one this crate understands.
pub fn is_known(kind: u16) -> bool {
    (INVOKE..=EVENT).contains(&kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_known_kinds() {
        assert_eq!(kind_name(INVOKE), "INVOKE");
        assert_eq!(kind_name(EVENT), "EVENT");
        assert_eq!(kind_name(99), "UNKNOWN");
    }

    #[test]
    fn known_range() {
        assert!(is_known(RESPONSE));
        assert!(!is_known(0));
        assert!(!is_known(5));
    }
}
