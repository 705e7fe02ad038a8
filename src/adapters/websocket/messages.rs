//! Inbound WebSocket frame schema.
//!
//! Clients send `{"type": ..., "payload": ...}` JSON frames. Decoding is
//! two-stage: the outer frame first, then the payload for the known
//! types, so an unknown type is ignored rather than treated as an error.

use serde::Deserialize;

use crate::domain::foundation::GameError;
use crate::domain::game::FinishCause;

#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypingKeyPayload {
    input_seq: String,
}

#[derive(Debug, Deserialize)]
struct FinCurrentSeqPayload {
    cause: FinishCause,
}

/// A decoded client command.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// Live typing progress: the prefix typed so far.
    TypingKey { input_seq: String },
    /// The current sequence finished, successfully or not.
    FinCurrentSeq { cause: FinishCause },
    /// The room owner starts the game.
    StartGame,
}

impl ClientCommand {
    /// Decodes one inbound text frame.
    ///
    /// Returns `Ok(None)` for syntactically valid frames of an unknown
    /// type; those are ignored by the session loop.
    pub fn decode(text: &str) -> Result<Option<Self>, GameError> {
        let frame: InboundFrame = serde_json::from_str(text)?;
        match frame.kind.as_str() {
            "TypingKey" => {
                let payload: TypingKeyPayload = serde_json::from_value(frame.payload)?;
                Ok(Some(ClientCommand::TypingKey {
                    input_seq: payload.input_seq,
                }))
            }
            "FinCurrentSeq" => {
                let payload: FinCurrentSeqPayload = serde_json::from_value(frame.payload)?;
                Ok(Some(ClientCommand::FinCurrentSeq {
                    cause: payload.cause,
                }))
            }
            "StartGame" => Ok(Some(ClientCommand::StartGame)),
            _ => Ok(None),
        }
    }
}
