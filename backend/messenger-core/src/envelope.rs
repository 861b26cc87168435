//! Records carried across the process boundary.
//!
//! - [`ClientEnvelope`]: renderer → host, for both send and invoke
//! - [`BroadcastEnvelope`]: host → renderer
//! - [`InvokeReply`]: host → renderer answer to one invoke
//!
//! Invoke failures travel as the tagged `failure` variant of [`InvokeReply`]
//! rather than as a thrown error, because the boundary only carries data.

use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound from the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    pub key: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Outbound from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastEnvelope {
    pub key: String,
    #[serde(default)]
    pub data: Value,
}

/// Result of one invoke call as it crosses the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InvokeReply {
    Success {
        #[serde(default)]
        data: Value,
    },
    Failure {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
}

/// Marker field of the untagged error object older peers send.
const LEGACY_ERROR_FLAG: &str = "__error";

impl InvokeReply {
    /// Failure reply built from a handler error and its source chain.
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {cause}"));
            source = cause.source();
        }

        InvokeReply::Failure {
            message: error.to_string(),
            stack: (!causes.is_empty()).then(|| causes.join("\n")),
        }
    }

    /// Interpret whatever came back from an invoke channel.
    ///
    /// Accepts the tagged form, the legacy `{ "__error": true, ... }` object,
    /// and treats anything else as a bare successful payload.
    pub fn decode(raw: Value) -> Self {
        if let Value::Object(ref map) = raw {
            if map.get(LEGACY_ERROR_FLAG).and_then(Value::as_bool) == Some(true) {
                return InvokeReply::Failure {
                    message: map
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    stack: map.get("stack").and_then(Value::as_str).map(str::to_string),
                };
            }
            if map.contains_key("outcome") {
                if let Ok(reply) = serde_json::from_value::<InvokeReply>(raw.clone()) {
                    return reply;
                }
            }
        }
        InvokeReply::Success { data: raw }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, InvokeReply::Failure { .. })
    }
}
