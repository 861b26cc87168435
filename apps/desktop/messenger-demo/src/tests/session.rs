use crate::session::SessionInfo;

#[test]
fn given_session_when_building_url_then_targets_loopback_port() {
    let session = SessionInfo::new(19876, "secret");

    let url = session.url().expect("valid url");

    assert_eq!(url.as_str(), "ws://127.0.0.1:19876/");
}

/// **VALUE**: Verifies the token never shows up in debug or log output.
///
/// **WHY THIS MATTERS**: The session is logged at startup; the token grants control
/// of the host to any local process that reads it.
#[test]
fn given_session_when_formatting_token_then_value_is_redacted() {
    let session = SessionInfo::new(19876, "secret-token");

    let rebound = session.with_port(40000);

    assert_eq!(rebound.port(), 40000);
    assert!(rebound.auth_token().matches("secret-token"));
    assert!(!format!("{:?}", rebound.auth_token()).contains("secret-token"));
    assert!(!format!("{}", rebound.auth_token()).contains("secret-token"));
}
