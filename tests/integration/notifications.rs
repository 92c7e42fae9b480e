use crate::common::{create_user, test_store};
use kindred_server::chat;
use kindred_server::events::ChatEvent;
use kindred_server::friends;
use kindred_server::notify;

fn message_event(store: &crate::common::TestStore, chat_id: &str, sender: &str) -> ChatEvent {
    let message = chat::send_message(&store.conn, chat_id, sender, "ping").unwrap();
    let members = chat::members(&store.conn, chat_id).unwrap();
    ChatEvent::NewMessage {
        message,
        members,
        sender_name: "Victor Tester".to_string(),
    }
}

// S6 — mute suppresses the push hand-off, not socket delivery. Socket
// delivery never goes through the gate; here we pin down the gate half.
#[test]
fn test_mute_suppresses_notification() {
    let store = test_store();
    create_user(&store.conn, "u", "ursula", 24, "f");
    create_user(&store.conn, "v", "victor", 26, "m");
    let c = chat::ensure_direct_chat(&store.conn, "u", "v").unwrap();

    let out = notify::gate_event(&store.conn, &message_event(&store, &c.id, "v"));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].recipient, "u");
    assert_eq!(out[0].sender_name, "Victor Tester");

    chat::set_mute(&store.conn, "u", &c.id, true, None).unwrap();
    let out = notify::gate_event(&store.conn, &message_event(&store, &c.id, "v"));
    assert!(out.is_empty());
}

#[test]
fn test_mute_round_trip_restores_gate() {
    let store = test_store();
    create_user(&store.conn, "u", "ursula", 24, "f");
    create_user(&store.conn, "v", "victor", 26, "m");
    let c = chat::ensure_direct_chat(&store.conn, "u", "v").unwrap();

    chat::set_mute(&store.conn, "u", &c.id, true, None).unwrap();
    chat::set_mute(&store.conn, "u", &c.id, false, None).unwrap();

    let out = notify::gate_event(&store.conn, &message_event(&store, &c.id, "v"));
    assert_eq!(out.len(), 1);
}

#[test]
fn test_mute_until_now_reads_as_unmuted_and_resets() {
    let store = test_store();
    create_user(&store.conn, "u", "ursula", 24, "f");
    create_user(&store.conn, "v", "victor", 26, "m");
    let c = chat::ensure_direct_chat(&store.conn, "u", "v").unwrap();

    let now = chrono::Utc::now().to_rfc3339();
    chat::set_mute(&store.conn, "u", &c.id, true, Some(&now)).unwrap();

    // muted_until == now is not muted, and the row is lazily reset
    assert!(!chat::is_muted(&store.conn, "u", &c.id).unwrap());
    let (muted, until): (bool, Option<String>) = store
        .conn
        .query_row(
            "SELECT is_muted, muted_until FROM mute_settings WHERE user_id = 'u'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert!(!muted);
    assert!(until.is_none());
}

#[test]
fn test_future_mute_holds() {
    let store = test_store();
    create_user(&store.conn, "u", "ursula", 24, "f");
    create_user(&store.conn, "v", "victor", 26, "m");
    let c = chat::ensure_direct_chat(&store.conn, "u", "v").unwrap();

    let later = (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
    chat::set_mute(&store.conn, "u", &c.id, true, Some(&later)).unwrap();
    assert!(chat::is_muted(&store.conn, "u", &c.id).unwrap());
}

#[test]
fn test_blocked_recipient_dropped() {
    let store = test_store();
    create_user(&store.conn, "u", "ursula", 24, "f");
    create_user(&store.conn, "v", "victor", 26, "m");
    let c = chat::ensure_direct_chat(&store.conn, "u", "v").unwrap();
    let event = message_event(&store, &c.id, "v");

    friends::block(&store.conn, "u", "v").unwrap();
    assert!(notify::gate_event(&store.conn, &event).is_empty());
}

#[test]
fn test_suspended_recipient_dropped() {
    let store = test_store();
    create_user(&store.conn, "u", "ursula", 24, "f");
    create_user(&store.conn, "v", "victor", 26, "m");
    let c = chat::ensure_direct_chat(&store.conn, "u", "v").unwrap();
    let event = message_event(&store, &c.id, "v");

    store
        .conn
        .execute("UPDATE profiles SET suspended = 1 WHERE id = 'u'", [])
        .unwrap();
    assert!(notify::gate_event(&store.conn, &event).is_empty());
}

#[test]
fn test_matched_event_enriches_sender_name() {
    let store = test_store();
    create_user(&store.conn, "u", "ursula", 24, "f");
    create_user(&store.conn, "v", "victor", 26, "m");

    let event = ChatEvent::Matched {
        to: "u".to_string(),
        other_user: "v".to_string(),
        chat_id: "c1".to_string(),
        blind: false,
    };
    let out = notify::gate_event(&store.conn, &event);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].event, "matched");
    assert_eq!(out[0].sender_name, "victor");
}

#[test]
fn test_socket_only_events_produce_nothing() {
    let store = test_store();
    let event = ChatEvent::Typing {
        chat_id: "c".to_string(),
        members: vec!["a".to_string(), "b".to_string()],
        users: vec!["a".to_string()],
    };
    assert!(notify::gate_event(&store.conn, &event).is_empty());
}
