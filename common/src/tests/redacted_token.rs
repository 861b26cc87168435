use crate::RedactedToken;

/// **VALUE**: Verifies the token never leaks through Debug or Display.
///
/// **WHY THIS MATTERS**: Transport code logs connection state freely. A token that
/// formats as itself would end up in log files.
#[test]
fn given_token_when_formatted_then_value_is_redacted() {
    // GIVEN: A token with a recognizable value
    let token = RedactedToken::new("super-secret-value");

    // WHEN: Formatting it both ways
    let debug = format!("{:?}", token);
    let display = format!("{}", token);

    // THEN: The secret does not appear
    assert!(!debug.contains("super-secret-value"));
    assert!(!display.contains("super-secret-value"));
    assert_eq!(token.len(), "super-secret-value".len());
}

/// **VALUE**: Verifies serialization is refused instead of silently writing the secret.
#[test]
fn given_token_when_serialized_then_returns_error() {
    // GIVEN: A token
    let token = RedactedToken::new("abc");

    // WHEN: Serializing to JSON
    let result = serde_json::to_string(&token);

    // THEN: Serialization fails
    assert!(result.is_err(), "RedactedToken must not serialize");
}

/// **VALUE**: Verifies token comparison accepts only the exact value.
#[test]
fn given_token_when_matching_candidates_then_only_exact_value_matches() {
    // GIVEN: A token
    let token = RedactedToken::new("handshake-token");

    // WHEN/THEN: Only the identical string matches
    assert!(token.matches("handshake-token"));
    assert!(!token.matches("handshake-tokeN"));
    assert!(!token.matches("handshake"));
    assert!(!token.matches(""));
}
