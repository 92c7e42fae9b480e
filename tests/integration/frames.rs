use kindred_server::gateway::{ClientFrame, MAX_FRAME_BYTES, ServerFrame};

#[test]
fn test_inbound_frames_parse() {
    let frame: ClientFrame =
        serde_json::from_str(r#"{"type": "join", "chat_id": "c1"}"#).unwrap();
    assert!(matches!(frame, ClientFrame::Join { chat_id } if chat_id == "c1"));

    let frame: ClientFrame =
        serde_json::from_str(r#"{"type": "message", "chat_id": "c1", "text": "hi"}"#).unwrap();
    assert!(matches!(frame, ClientFrame::Message { .. }));

    let frame: ClientFrame = serde_json::from_str(
        r#"{"type": "mute_set", "chat_id": "c1", "muted": true, "until": null}"#,
    )
    .unwrap();
    assert!(matches!(frame, ClientFrame::MuteSet { muted: true, .. }));

    let frame: ClientFrame = serde_json::from_str(
        r#"{"type": "matchmaking_enqueue", "criteria": {"age_min": 20, "age_max": 30}}"#,
    )
    .unwrap();
    match frame {
        ClientFrame::MatchmakingEnqueue { criteria } => {
            assert_eq!(criteria.gender, "any");
            assert!(!criteria.blind);
        }
        other => panic!("wrong variant: {other:?}"),
    }
}

#[test]
fn test_unknown_frame_kind_rejected() {
    // The inbound surface is a closed sum: no guessing on unknown kinds
    assert!(serde_json::from_str::<ClientFrame>(r#"{"type": "sudo", "x": 1}"#).is_err());
    assert!(serde_json::from_str::<ClientFrame>(r#"{"no_type": true}"#).is_err());
    assert!(serde_json::from_str::<ClientFrame>(r#"{"type": "join"}"#).is_err());
}

#[test]
fn test_outbound_frames_are_tagged() {
    let json = serde_json::to_value(&ServerFrame::Requeued).unwrap();
    assert_eq!(json["type"], "requeued");

    let json = serde_json::to_value(&ServerFrame::Error {
        code: "too_large",
        message: "frame too big".to_string(),
    })
    .unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["code"], "too_large");

    let json = serde_json::to_value(&ServerFrame::Matched {
        chat_id: "c1".to_string(),
        other_user: "u2".to_string(),
        blind: false,
    })
    .unwrap();
    assert_eq!(json["type"], "matched");
    assert_eq!(json["chat_id"], "c1");
}

#[test]
fn test_frame_size_policy() {
    assert_eq!(MAX_FRAME_BYTES, 64 * 1024);
}
