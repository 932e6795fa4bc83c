//! Wire protocol: line-delimited JSON messages, one per transport frame.
//!
//! `type` discriminates the message; the closed sum is matched
//! exhaustively by the connection handler rather than dispatched
//! reflectively (`spec.md` §9).

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::rga::Op;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello {
        doc_id: String,
        client_id: String,
        #[serde(default)]
        last_seen_server_seq: u64,
    },
    Op {
        doc_id: String,
        client_id: String,
        client_msg_id: String,
        op: Op,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    HelloAck {
        doc_id: String,
        server_seq: u64,
    },
    Resync {
        doc_id: String,
        server_seq: u64,
        full_text: String,
    },
    OpEcho {
        doc_id: String,
        server_seq: u64,
        origin_client_id: String,
        client_msg_id: String,
        op: Op,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        // Messages are hand-built from internal state; serialization of a
        // well-formed `ServerMessage` cannot fail.
        serde_json::to_string(self).expect("ServerMessage serialization is infallible")
    }
}

/// Parses one line of wire input, rejecting structurally-valid-but-empty
/// identifiers the way the reference implementation's schema validators do.
pub fn parse_client_message(raw: &str) -> Result<ClientMessage, ProtocolError> {
    let msg: ClientMessage = serde_json::from_str(raw)?;
    validate(&msg)?;
    Ok(msg)
}

fn validate(msg: &ClientMessage) -> Result<(), ProtocolError> {
    match msg {
        ClientMessage::Hello { doc_id, client_id, .. } => {
            if doc_id.is_empty() {
                return Err(ProtocolError::EmptyDocId);
            }
            if client_id.is_empty() {
                return Err(ProtocolError::EmptyClientId);
            }
        }
        ClientMessage::Op {
            doc_id,
            client_id,
            client_msg_id,
            ..
        } => {
            if doc_id.is_empty() {
                return Err(ProtocolError::EmptyDocId);
            }
            if client_id.is_empty() {
                return Err(ProtocolError::EmptyClientId);
            }
            if client_msg_id.is_empty() {
                return Err(ProtocolError::EmptyClientMsgId);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rga::{ElementId, InsertOp, root_id};

    #[test]
    fn parses_hello_with_default_last_seen() {
        let msg = parse_client_message(r#"{"type":"hello","doc_id":"d1","client_id":"c1"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Hello {
                doc_id: "d1".to_string(),
                client_id: "c1".to_string(),
                last_seen_server_seq: 0,
            }
        );
    }

    #[test]
    fn rejects_empty_doc_id() {
        let err = parse_client_message(r#"{"type":"hello","doc_id":"","client_id":"c1"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyDocId));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = parse_client_message(r#"{"type":"bogus"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidJson(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_client_message("not json").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidJson(_)));
    }

    #[test]
    fn op_message_serializes_with_encoded_element_ids() {
        let echo = ServerMessage::OpEcho {
            doc_id: "d1".to_string(),
            server_seq: 3,
            origin_client_id: "c1".to_string(),
            client_msg_id: "m1".to_string(),
            op: Op::Insert(InsertOp {
                parent_id: root_id(),
                id: ElementId::new(1, "c1"),
                value: 'H',
            }),
        };
        let json = echo.to_json();
        assert!(json.contains(r#""type":"op_echo""#));
        assert!(json.contains(r#""parent_id":[0,"root"]"#));
    }
}
