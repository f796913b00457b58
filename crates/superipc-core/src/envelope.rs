use serde::{Deserialize, Serialize};

use crate::call_id::CallId;

/// Phase of a call that an envelope represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultMode {
    Init,
    Progress,
    Complete,
}

impl ResultMode {
    /// Wire spelling of this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            ResultMode::Init => "INIT",
            ResultMode::Progress => "PROGRESS",
            ResultMode::Complete => "COMPLETE",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ResultMode::Complete
    }
}

impl std::fmt::Display for ResultMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reply message carried over a channel or its reply stream.
///
/// `content` and `error` are both serialized JSON text. They are mutually
/// exclusive in practice; nothing in the type enforces it.
///
/// Envelopes are built once per emission and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub result_mode: ResultMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<CallId>,
}

impl Envelope {
    /// Envelope carrying a serialized success payload.
    pub fn content(mode: ResultMode, content: impl Into<String>, call_id: Option<CallId>) -> Self {
        Self {
            content: Some(content.into()),
            error: None,
            result_mode: mode,
            call_id,
        }
    }

    /// Envelope carrying a serialized error.
    pub fn error(mode: ResultMode, error: impl Into<String>, call_id: Option<CallId>) -> Self {
        Self {
            content: None,
            error: Some(error.into()),
            result_mode: mode,
            call_id,
        }
    }

    /// Terminal envelope with neither payload nor error.
    pub fn empty_complete(call_id: Option<CallId>) -> Self {
        Self {
            content: None,
            error: None,
            result_mode: ResultMode::Complete,
            call_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.result_mode.is_terminal()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_field_names() {
        let envelope = Envelope::content(ResultMode::Progress, "1", Some(7));
        let json = serde_json::to_string(&envelope).unwrap();
        assert_eq!(json, r#"{"content":"1","resultMode":"PROGRESS","callId":7}"#);
    }

    #[test]
    fn omits_absent_fields() {
        let envelope = Envelope::content(ResultMode::Complete, r#"{"x":1}"#, None);
        let json = serde_json::to_string(&envelope).unwrap();
        assert_eq!(json, r#"{"content":"{\"x\":1}","resultMode":"COMPLETE"}"#);
    }

    #[test]
    fn parses_envelope_without_optional_fields() {
        let envelope: Envelope = serde_json::from_str(r#"{"resultMode":"INIT"}"#).unwrap();
        assert_eq!(envelope.result_mode, ResultMode::Init);
        assert!(envelope.content.is_none());
        assert!(envelope.error.is_none());
        assert!(envelope.call_id.is_none());
    }

    #[test]
    fn rejects_unknown_result_mode() {
        let parsed = serde_json::from_str::<Envelope>(r#"{"resultMode":"DONE"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn only_complete_is_terminal() {
        assert!(!ResultMode::Init.is_terminal());
        assert!(!ResultMode::Progress.is_terminal());
        assert!(ResultMode::Complete.is_terminal());
        assert!(Envelope::empty_complete(Some(3)).is_terminal());
    }
}
