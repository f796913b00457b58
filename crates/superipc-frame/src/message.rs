use serde::{Deserialize, Serialize};
use serde_json::Value;
use superipc_core::{CallId, Envelope};

use crate::error::{FrameError, Result};
use crate::kind::{kind_name, EVENT, INVOKE, REJECTED, RESPONSE};

/// Request to run `channel` with optional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeMessage {
    /// Correlates the response with this request on one connection.
    pub seq: u64,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<CallId>,
}

/// The envelope answering invocation `seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub seq: u64,
    pub envelope: Envelope,
}

/// Invocation `seq` was refused before any handler ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedMessage {
    pub seq: u64,
    pub code: String,
    pub reason: String,
}

/// Envelope pushed onto a named reply stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub stream: String,
    pub envelope: Envelope,
}

/// Any message that travels in a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Invoke(InvokeMessage),
    Response(ResponseMessage),
    Rejected(RejectedMessage),
    Event(EventMessage),
}

impl WireMessage {
    pub fn kind(&self) -> u16 {
        match self {
            WireMessage::Invoke(_) => INVOKE,
            WireMessage::Response(_) => RESPONSE,
            WireMessage::Rejected(_) => REJECTED,
            WireMessage::Event(_) => EVENT,
        }
    }

    /// Serialize the payload into `out`.
    pub fn write_payload(&self, out: impl std::io::Write) -> Result<()> {
        let written = match self {
            WireMessage::Invoke(msg) => serde_json::to_writer(out, msg),
            WireMessage::Response(msg) => serde_json::to_writer(out, msg),
            WireMessage::Rejected(msg) => serde_json::to_writer(out, msg),
            WireMessage::Event(msg) => serde_json::to_writer(out, msg),
        };
        written.map_err(|source| FrameError::Malformed {
            kind: kind_name(self.kind()),
            source,
        })
    }

    /// Parse a payload according to the frame kind it arrived with.
    pub fn decode(kind: u16, payload: &[u8]) -> Result<Self> {
        let malformed = |source| FrameError::Malformed {
            kind: kind_name(kind),
            source,
        };
        match kind {
            INVOKE => serde_json::from_slice(payload)
                .map(WireMessage::Invoke)
                .map_err(malformed),
            RESPONSE => serde_json::from_slice(payload)
                .map(WireMessage::Response)
                .map_err(malformed),
            REJECTED => serde_json::from_slice(payload)
                .map(WireMessage::Rejected)
                .map_err(malformed),
            EVENT => serde_json::from_slice(payload)
                .map(WireMessage::Event)
                .map_err(malformed),
            other => Err(FrameError::UnknownKind {
                kind: other,
                len: payload.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use superipc_core::ResultMode;

    use super::*;

    fn reencode(message: &WireMessage) -> WireMessage {
        let mut payload = Vec::new();
        message.write_payload(&mut payload).unwrap();
        WireMessage::decode(message.kind(), &payload).unwrap()
    }

    #[test]
    fn invoke_uses_camel_case_call_id() {
        let message = WireMessage::Invoke(InvokeMessage {
            seq: 3,
            channel: "count".to_string(),
            args: Some(json!(5)),
            call_id: Some(7),
        });
        let mut payload = Vec::new();
        message.write_payload(&mut payload).unwrap();
        let value: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["callId"], 7);
        assert_eq!(value["channel"], "count");

        assert_eq!(reencode(&message), message);
    }

    #[test]
    fn invoke_without_args_or_call_id() {
        let WireMessage::Invoke(invoke) =
            WireMessage::decode(INVOKE, br#"{"seq":1,"channel":"ping"}"#).unwrap()
        else {
            panic!("expected invoke");
        };
        assert!(invoke.args.is_none());
        assert!(invoke.call_id.is_none());
    }

    #[test]
    fn event_carries_envelope() {
        let message = WireMessage::Event(EventMessage {
            stream: "count-ASYNC_REPLY".to_string(),
            envelope: Envelope::content(ResultMode::Progress, "1", Some(7)),
        });
        assert_eq!(reencode(&message), message);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(matches!(
            WireMessage::decode(42, b"{}"),
            Err(FrameError::UnknownKind { kind: 42, len: 2 })
        ));
    }

    #[test]
    fn payload_for_wrong_kind_is_malformed() {
        assert!(matches!(
            WireMessage::decode(RESPONSE, br#"{"stream":"x"}"#),
            Err(FrameError::Malformed {
                kind: "RESPONSE",
                ..
            })
        ));
    }
}
