use super::*;
use crate::types::UserRole;

fn server_frame(event: &str, data: serde_json::Value) -> Frame {
    Frame::new(event, data).with_room("room_c1")
}

#[test]
fn join_room_frame_carries_credentials() {
    let frame = ClientEvent::JoinRoom {
        room_id: "room_c1".to_owned(),
        user_id: "u1".to_owned(),
        user_token: "tok".to_owned(),
    }
    .to_frame();

    assert_eq!(frame.event, JOIN_ROOM);
    assert_eq!(frame.room_id.as_deref(), Some("room_c1"));
    assert_eq!(frame.data, json!({ "roomId": "room_c1", "userId": "u1", "userToken": "tok" }));
}

#[test]
fn send_message_frame_names_message_type() {
    let frame = ClientEvent::SendMessage {
        room_id: "r".to_owned(),
        message: "hello".to_owned(),
        message_type: MessageType::Text,
    }
    .to_frame();

    assert_eq!(frame.event, SEND_MESSAGE);
    assert_eq!(frame.data["messageType"], "text");
    assert_eq!(frame.data["message"], "hello");
}

#[test]
fn typing_frames_only_carry_room() {
    let start = ClientEvent::TypingStart { room_id: "r".to_owned() }.to_frame();
    let stop = ClientEvent::TypingStop { room_id: "r".to_owned() }.to_frame();
    assert_eq!(start.event, TYPING_START);
    assert_eq!(stop.event, TYPING_STOP);
    assert_eq!(stop.data, json!({ "roomId": "r" }));
}

#[test]
fn new_message_inherits_frame_room() {
    let frame = server_frame(
        NEW_MESSAGE,
        json!({
            "id": "m1",
            "userId": "u2",
            "userName": "Bo",
            "userRole": "charity",
            "message": "thanks!",
            "timestamp": "2024-05-01T10:00:00Z"
        }),
    );

    let ServerEvent::NewMessage(msg) = ServerEvent::from_frame(&frame).expect("parse") else {
        panic!("expected new message");
    };
    assert_eq!(msg.user_role, UserRole::Charity);
    assert_eq!(msg.room_id.as_deref(), Some("room_c1"));
}

#[test]
fn presence_events_parse_counts_and_users() {
    let joined = ServerEvent::from_frame(&server_frame(USER_JOINED, json!({"participantCount": 4}))).expect("parse");
    assert_eq!(joined, ServerEvent::UserJoined { room_id: Some("room_c1".into()), participant_count: 4 });

    let left = ServerEvent::from_frame(&server_frame(USER_LEFT, json!({"participantCount": 3}))).expect("parse");
    assert_eq!(left, ServerEvent::UserLeft { room_id: Some("room_c1".into()), participant_count: 3 });

    let typing =
        ServerEvent::from_frame(&server_frame(USER_TYPING, json!({"userId": "u1", "userName": "Ada"}))).expect("parse");
    assert_eq!(
        typing,
        ServerEvent::UserTyping {
            room_id: Some("room_c1".into()),
            user: TypingUser { user_id: "u1".into(), user_name: "Ada".into() },
        }
    );

    let stop = ServerEvent::from_frame(&server_frame(USER_STOP_TYPING, json!({"userId": "u1"}))).expect("parse");
    assert_eq!(stop, ServerEvent::UserStopTyping { room_id: Some("room_c1".into()), user_id: "u1".into() });
}

#[test]
fn join_ack_and_error_tolerate_sparse_payloads() {
    let ack = ServerEvent::from_frame(&server_frame(ROOM_JOINED, json!({}))).expect("parse");
    assert_eq!(ack, ServerEvent::RoomJoined(RoomJoined::default()));

    let err = ServerEvent::from_frame(&server_frame(ERROR, json!({"message": "Room not found"}))).expect("parse");
    assert_eq!(
        err,
        ServerEvent::Error(ServerError { message: "Room not found".into(), room_id: Some("room_c1".into()) })
    );
}

#[test]
fn room_scope_prefers_payload_over_envelope() {
    let typing = Frame::new(USER_TYPING, json!({"userId": "u9", "roomId": "room_c2"})).with_room("room_c1");
    let ServerEvent::UserTyping { room_id, .. } = ServerEvent::from_frame(&typing).expect("parse") else {
        panic!("expected typing");
    };
    assert_eq!(room_id.as_deref(), Some("room_c2"));

    let unscoped = Frame::new(USER_LEFT, json!({"participantCount": 1}));
    let event = ServerEvent::from_frame(&unscoped).expect("parse");
    assert_eq!(event, ServerEvent::UserLeft { room_id: None, participant_count: 1 });

    assert!(in_room(None, "room_c1"));
    assert!(in_room(Some("room_c1"), "room_c1"));
    assert!(!in_room(Some("room_c2"), "room_c1"));
}

#[test]
fn malformed_known_payload_is_an_error() {
    let err = ServerEvent::from_frame(&server_frame(USER_JOINED, json!({"participantCount": "many"})));
    assert!(err.is_err());
}

#[test]
fn unknown_events_pass_through() {
    let event = ServerEvent::from_frame(&server_frame("donation-received", json!({"amount": 5}))).expect("parse");
    assert_eq!(event.name(), "donation-received");
    assert!(matches!(event, ServerEvent::Other { .. }));
}
