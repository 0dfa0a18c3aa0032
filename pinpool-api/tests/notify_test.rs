use pinpool_api::errors::NotificationError;
use pinpool_api::notify::{InboundCommand, Notification};
use serde_json::{json, Value};

#[test]
fn test_message_notification_json() {
    let notification = Notification::message(200, "Case Open");
    let value: Value = serde_json::from_str(&notification.to_json()).unwrap();

    assert_eq!(value, json!({"status": 200, "message": "Case Open", "state": null}));
    assert_eq!(notification.status(), 200);
    assert_eq!(notification.message_text(), Some("Case Open"));
    assert!(notification.state_value().is_none());
}

#[test]
fn test_state_notification_json() {
    let notification = Notification::state(200, json!({"paused": true})).unwrap();
    let value: Value = serde_json::from_str(&notification.to_string()).unwrap();

    assert_eq!(value["state"]["paused"], json!(true));
    assert!(value["message"].is_null());
}

#[test]
fn test_notification_requires_exactly_one_body() {
    assert_eq!(Notification::new(200, None, None), Err(NotificationError::MissingBody));
    assert_eq!(
        Notification::new(200, Some("hi".into()), Some(json!({}))),
        Err(NotificationError::AmbiguousBody)
    );
    assert!(Notification::new(400, Some("Invalid JSON".into()), None).is_ok());
}

#[test]
fn test_notification_roundtrips_through_serde() {
    let original = Notification::state(201, json!({"port": 7000})).unwrap();
    let decoded: Notification = serde_json::from_str(&original.to_json()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn test_null_state_is_not_a_body() {
    assert_eq!(Notification::new(200, None, Some(Value::Null)), Err(NotificationError::MissingBody));
    assert_eq!(Notification::state(200, Value::Null), Err(NotificationError::MissingBody));

    // Next to a message, a null state is simply absent
    let notification = Notification::new(200, Some("Case Open".into()), Some(Value::Null)).unwrap();
    assert!(notification.state_value().is_none());
}

#[test]
fn test_deserialization_enforces_exactly_one_body() {
    let empty = serde_json::from_str::<Notification>(r#"{"status":200,"message":null,"state":null}"#);
    assert!(empty.unwrap_err().to_string().contains("Either message or state should be set"));

    let missing = serde_json::from_str::<Notification>(r#"{"status":200}"#);
    assert!(missing.is_err());

    let both = serde_json::from_str::<Notification>(r#"{"status":200,"message":"hi","state":{}}"#);
    assert!(both.unwrap_err().to_string().contains("Only one of message or state may be set"));

    let decoded: Notification = serde_json::from_str(r#"{"status":400,"message":"Invalid JSON","state":null}"#).unwrap();
    assert_eq!(decoded, Notification::message(400, "Invalid JSON"));
}

#[test]
fn test_state_map_is_always_a_body() {
    let mut state = serde_json::Map::new();
    state.insert("paused".to_string(), json!(false));
    let notification = Notification::state_map(200, state);

    assert_eq!(notification.state_value(), Some(&json!({"paused": false})));
    assert_eq!(notification.to_json(), r#"{"status":200,"message":null,"state":{"paused":false}}"#);
}

#[test]
fn test_inbound_pause_and_resume() {
    assert_eq!(InboundCommand::parse(r#"{"command": "pause"}"#).unwrap(), InboundCommand::Pause);
    assert_eq!(InboundCommand::parse(r#"{"command": "resume"}"#).unwrap(), InboundCommand::Resume);
}

#[test]
fn test_inbound_other_passes_through_unmodified() {
    let raw = r#"{"action": "open_case", "value": 1}"#;
    match InboundCommand::parse(raw).unwrap() {
        InboundCommand::Other(value) => assert_eq!(value, json!({"action": "open_case", "value": 1})),
        other => panic!("unexpected command: {:?}", other),
    }

    // A non-string command is not a control command either
    assert!(matches!(
        InboundCommand::parse(r#"{"command": 3}"#).unwrap(),
        InboundCommand::Other(_)
    ));
}

#[test]
fn test_inbound_invalid_json() {
    let err = InboundCommand::parse("{not json").unwrap_err();
    assert!(matches!(err, NotificationError::InvalidJson(_)));
    assert!(err.to_string().starts_with("Invalid JSON:"));
}
