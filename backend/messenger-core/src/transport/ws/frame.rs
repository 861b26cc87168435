use crate::error::transport::TransportError;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

/// One WebSocket text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Auth {
        token: String,
    },
    AuthResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Send {
        channel: String,
        payload: Value,
    },
    Invoke {
        request_id: u64,
        channel: String,
        payload: Value,
    },
    Reply {
        request_id: u64,
        payload: Value,
    },
    /// The invoke never reached a handler.
    Fault {
        request_id: u64,
        channel: String,
        message: String,
    },
    Event {
        channel: String,
        payload: Value,
    },
}

impl Frame {
    #[track_caller]
    pub(crate) fn to_message(&self) -> Result<Message, TransportError> {
        let text = serde_json::to_string(self)?;
        Ok(Message::Text(text.into()))
    }

    /// Decode a text frame. `None` for non-text messages (ping, pong, binary).
    #[track_caller]
    pub(crate) fn from_message(message: &Message) -> Option<Result<Frame, TransportError>> {
        match message {
            Message::Text(text) => {
                Some(serde_json::from_str(text.as_str()).map_err(TransportError::from))
            }
            _ => None,
        }
    }
}
