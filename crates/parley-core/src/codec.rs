//! Frame codec for the real-time channel.
//!
//! Heartbeats travel as the bare [`HEARTBEAT_SENTINEL`] string, never as
//! JSON. Every other frame is a JSON [`Envelope`]. Checking for the sentinel
//! first lets the receiver tell a heartbeat from a malformed envelope without
//! attempting a parse.

use serde::Serialize;

use crate::constants::HEARTBEAT_SENTINEL;
use crate::envelope::Envelope;
use crate::errors::CodecError;

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundFrame {
    /// Liveness acknowledgment only.
    Heartbeat,
    /// Business or rejection envelope.
    Envelope(Envelope),
}

/// A frame to be transmitted.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundFrame {
    /// Bare heartbeat sentinel.
    Heartbeat,
    /// Full envelope.
    Envelope(Envelope),
}

/// Decode a raw text frame.
pub fn decode(raw: &str) -> Result<InboundFrame, CodecError> {
    if raw == HEARTBEAT_SENTINEL {
        return Ok(InboundFrame::Heartbeat);
    }
    serde_json::from_str(raw)
        .map(InboundFrame::Envelope)
        .map_err(CodecError::Malformed)
}

/// Encode an outbound frame to its wire text.
pub fn encode(frame: &OutboundFrame) -> Result<String, CodecError> {
    match frame {
        OutboundFrame::Heartbeat => Ok(HEARTBEAT_SENTINEL.to_owned()),
        OutboundFrame::Envelope(envelope) => encode_envelope(envelope),
    }
}

/// Encode a typed envelope to its wire text.
pub fn encode_envelope<T: Serialize>(envelope: &Envelope<T>) -> Result<String, CodecError> {
    serde_json::to_string(envelope).map_err(CodecError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::OperationType;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn sentinel_decodes_as_heartbeat() {
        assert_eq!(decode("heartbeat").unwrap(), InboundFrame::Heartbeat);
    }

    #[test]
    fn sentinel_match_is_exact() {
        assert_matches!(decode("heartbeat "), Err(CodecError::Malformed(_)));
        assert_matches!(decode("\"heartbeat\""), Err(CodecError::Malformed(_)));
    }

    #[test]
    fn envelope_decodes() {
        let raw = r#"{"status":200,"operationType":"send","data":{"friendId":"f1"}}"#;
        let frame = decode(raw).unwrap();
        assert_matches!(frame, InboundFrame::Envelope(env) => {
            assert_eq!(env.status, 200);
            assert_eq!(env.operation_type, OperationType::Send);
            assert_eq!(env.data["friendId"], "f1");
        });
    }

    #[test]
    fn garbage_is_malformed() {
        assert_matches!(decode("not json"), Err(CodecError::Malformed(_)));
        assert_matches!(decode(r#"{"operationType":"send"}"#), Err(CodecError::Malformed(_)));
        assert_matches!(decode("401"), Err(CodecError::Malformed(_)));
    }

    #[test]
    fn bare_rejection_decodes() {
        let frame = decode(r#"{"status":401,"operationType":"x","message":"expired"}"#).unwrap();
        assert_matches!(frame, InboundFrame::Envelope(env) => {
            assert_eq!(env.status, 401);
            assert!(env.data.is_null());
            assert_eq!(env.server_message().as_deref(), Some("expired"));
        });
    }

    #[test]
    fn heartbeat_encodes_bare() {
        assert_eq!(encode(&OutboundFrame::Heartbeat).unwrap(), "heartbeat");
    }

    #[test]
    fn envelope_encodes_full_shape() {
        let frame = OutboundFrame::Envelope(Envelope::new(
            OperationType::Append,
            json!({"content": "line"}),
        ));
        let text = encode(&frame).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"status": 200, "operationType": "append", "data": {"content": "line"}})
        );
    }

    #[test]
    fn typed_envelope_encodes() {
        #[derive(Serialize)]
        struct Note<'a> {
            text: &'a str,
        }
        let text = encode_envelope(&Envelope::new(OperationType::Replace, Note { text: "x" }))
            .unwrap();
        assert!(text.contains(r#""operationType":"replace""#));
    }
}
