// Unit tests for error module

use crate::error::DemoError;

use messenger_core::error::{ConfigError, StoreError, TransportError};

use common::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Tests that errors serialize with their variant tag.
///
/// **BUG THIS CATCHES**: Would catch if someone removes the `#[derive(Serialize)]`
/// or adds a non-serializable field.
#[test]
fn given_demo_error_when_serialized_then_contains_variant_and_message() {
    // GIVEN: A DemoError
    let err = DemoError::Transport {
        message: String::from("Test"),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Serializing to JSON
    let json = serde_json::to_string(&err).expect("Error should be serializable");

    // THEN: Tag and message present
    assert!(json.contains("Transport"), "JSON should contain variant name");
    assert!(json.contains("Test"), "JSON should contain message");
}

/// **VALUE**: Verifies core errors keep their message when converted.
#[test]
fn given_store_error_when_converted_then_becomes_core_with_message() {
    let source = StoreError::UnknownKey {
        key: String::from("missing"),
        location: ErrorLocation::from(Location::caller()),
    };

    let err = DemoError::from(source);

    match err {
        DemoError::Core { message, .. } => assert!(message.contains("missing")),
        other => panic!("Expected Core variant, got {:?}", other),
    }
}

/// **VALUE**: Verifies transport and config failures keep their own variant.
///
/// **BUG THIS CATCHES**: Would catch if every core error collapsed into `Core`, hiding
/// whether the socket or the config file was at fault.
#[test]
fn given_core_errors_when_converted_then_variant_follows_concern() {
    let transport = DemoError::from(TransportError::Closed {
        message: String::from("gone"),
        location: ErrorLocation::from(Location::caller()),
    });
    let config = DemoError::from(ConfigError::ValidationError {
        reason: String::from("port"),
        location: ErrorLocation::from(Location::caller()),
    });

    assert!(matches!(transport, DemoError::Transport { ref message, .. } if message.contains("gone")));
    assert!(matches!(config, DemoError::Config { ref message, .. } if message.contains("port")));
}
