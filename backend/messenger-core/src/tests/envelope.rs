use crate::envelope::{ClientEnvelope, InvokeReply};

use std::fmt;

use serde_json::json;

#[derive(Debug)]
struct Inner;

impl fmt::Display for Inner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "disk full")
    }
}

impl std::error::Error for Inner {}

#[derive(Debug)]
struct Outer(Inner);

impl fmt::Display for Outer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "save failed")
    }
}

impl std::error::Error for Outer {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// **VALUE**: Verifies the client envelope wire shape, including the optional token.
///
/// **WHY THIS MATTERS**: Peers in other processes match on these exact field names.
#[test]
fn given_client_envelope_when_serialized_then_uses_key_data_token_fields() {
    let with_token = ClientEnvelope {
        key: String::from("add"),
        data: json!([1, 2]),
        token: Some(String::from("t-1")),
    };
    let without_token = ClientEnvelope {
        token: None,
        ..with_token.clone()
    };

    assert_eq!(
        serde_json::to_value(&with_token).unwrap(),
        json!({ "key": "add", "data": [1, 2], "token": "t-1" })
    );
    assert_eq!(
        serde_json::to_value(&without_token).unwrap(),
        json!({ "key": "add", "data": [1, 2] })
    );
}

/// **VALUE**: Verifies failure replies carry the message and the source chain.
#[test]
fn given_error_with_source_when_converted_then_stack_lists_causes() {
    // GIVEN: A two-level error
    let error = Outer(Inner);

    // WHEN: Converting
    let reply = InvokeReply::from_error(&error);

    // THEN: Message from the top, cause in the stack
    assert_eq!(
        reply,
        InvokeReply::Failure {
            message: String::from("save failed"),
            stack: Some(String::from("caused by: disk full")),
        }
    );
    assert_eq!(
        serde_json::to_value(&reply).unwrap(),
        json!({ "outcome": "failure", "message": "save failed", "stack": "caused by: disk full" })
    );
}

/// **VALUE**: Verifies the decoder understands tagged, legacy and bare replies.
///
/// **BUG THIS CATCHES**: A bare object payload that happens to lack "outcome" must not
/// be mistaken for a failure, and a legacy `__error` object must not be returned as data.
#[test]
fn given_various_reply_shapes_when_decoded_then_classified_correctly() {
    assert_eq!(
        InvokeReply::decode(json!({ "outcome": "success", "data": 3 })),
        InvokeReply::Success { data: json!(3) }
    );
    assert_eq!(
        InvokeReply::decode(json!({ "__error": true, "message": "x", "stack": "at y" })),
        InvokeReply::Failure {
            message: String::from("x"),
            stack: Some(String::from("at y")),
        }
    );
    assert_eq!(
        InvokeReply::decode(json!({ "total": 3 })),
        InvokeReply::Success { data: json!({ "total": 3 }) }
    );
    assert_eq!(
        InvokeReply::decode(json!({ "__error": false })),
        InvokeReply::Success { data: json!({ "__error": false }) }
    );
    assert!(InvokeReply::decode(json!({ "outcome": "failure", "message": "boom" })).is_failure());
}
