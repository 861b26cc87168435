use crate::config::{ChannelNames, MessengerConfig};
use crate::error::config::ConfigError;

use tempfile::TempDir;

/// **VALUE**: Verifies a missing config file yields the interop defaults.
///
/// **WHY THIS MATTERS**: Host and renderer must agree on channel names. A first run
/// with no config file has to land on the well-known names, not empty strings.
#[test]
fn given_missing_file_when_loading_then_returns_defaults() {
    // GIVEN: An empty directory
    let dir = TempDir::new().unwrap();

    // WHEN: Loading
    let config = MessengerConfig::load(dir.path()).expect("defaults");

    // THEN: Default channel names and port
    assert_eq!(config.channels.client_event, "Messenger::Message::ClientEvent");
    assert_eq!(config.channels.service_response, "Messenger::Message::ServiceResponse");
    assert_eq!(config.channels.invoke_namespace, "Messenger::Invoke::Ipc");
    assert_eq!(config.transport.port, 19876);
}

/// **VALUE**: Verifies save followed by load preserves custom values.
#[test]
fn given_custom_config_when_saved_and_loaded_then_values_survive() {
    // GIVEN: A config with a custom namespace and port
    let dir = TempDir::new().unwrap();
    let mut config = MessengerConfig::default();
    config.channels.invoke_namespace = String::from("App::Invoke");
    config.transport.port = 20001;

    // WHEN: Saving and loading
    config.save(dir.path()).expect("save");
    let loaded = MessengerConfig::load(dir.path()).expect("load");

    // THEN: Values match and no temp file is left behind
    assert_eq!(loaded.channels, config.channels);
    assert_eq!(loaded.transport.port, 20001);
    assert!(!dir.path().join("messenger.json.tmp").exists());
}

/// **VALUE**: Verifies a partial file fills omitted fields with defaults.
#[test]
fn given_partial_file_when_loading_then_missing_fields_default() {
    // GIVEN: A file naming only the port
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("messenger.json"), r#"{ "transport": { "port": 4000 } }"#)
        .unwrap();

    // WHEN: Loading
    let config = MessengerConfig::load(dir.path()).expect("load");

    // THEN: Port from file, channels from defaults
    assert_eq!(config.transport.port, 4000);
    assert_eq!(config.channels, ChannelNames::default());
}

/// **VALUE**: Verifies a corrupted file is reported, not silently replaced.
#[test]
fn given_corrupt_file_when_loading_then_returns_parse_error() {
    // GIVEN: Invalid JSON
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("messenger.json"), "{ not json").unwrap();

    // WHEN: Loading
    let result = MessengerConfig::load(dir.path());

    // THEN: ParseError
    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: Verifies validation rejects configs that would break routing.
///
/// **BUG THIS CATCHES**: Identical channel names would feed broadcasts into the
/// host's send listener; a trailing separator would produce `ns::::key` channels.
#[test]
fn given_invalid_values_when_validating_then_returns_validation_error() {
    let mut duplicate = MessengerConfig::default();
    duplicate.channels.service_response = duplicate.channels.client_event.clone();

    let mut empty = MessengerConfig::default();
    empty.channels.client_event = String::from("  ");

    let mut trailing = MessengerConfig::default();
    trailing.channels.invoke_namespace = String::from("Ns::");

    let mut zero_port = MessengerConfig::default();
    zero_port.transport.port = 0;

    let mut bad_version = MessengerConfig::default();
    bad_version.version = 99;

    for config in [duplicate, empty, trailing, zero_port, bad_version] {
        assert!(
            matches!(config.validate(), Err(ConfigError::ValidationError { .. })),
            "Expected validation error for {:?}",
            config
        );
    }
    assert!(MessengerConfig::default().validate().is_ok());
}

/// **VALUE**: Verifies invoke channel derivation for default and custom namespaces.
#[test]
fn given_channel_names_when_deriving_invoke_channel_then_joins_with_separator() {
    let defaults = ChannelNames::default();
    assert_eq!(defaults.invoke_channel("add"), "Messenger::Invoke::Ipc::add");

    let custom = ChannelNames {
        invoke_namespace: String::from("App"),
        ..ChannelNames::default()
    };
    assert_eq!(custom.invoke_channel("add"), "App::add");
}
