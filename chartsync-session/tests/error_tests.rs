use chartsync_session::SessionError;

#[test]
fn error_display_invalid_token() {
    let err = SessionError::InvalidToken("no dot".into());
    let msg = format!("{err}");
    assert!(msg.contains("invalid session token"));
    assert!(msg.contains("no dot"));
}

#[test]
fn error_from_serde_json() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: SessionError = json_err.into();
    assert!(format!("{err}").contains("invalid token payload"));
}
