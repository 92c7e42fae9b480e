use crate::common::test_store;
use kindred_server::chat;

fn reaction_count(store: &crate::common::TestStore, message_id: &str) -> i64 {
    store
        .conn
        .query_row(
            "SELECT COUNT(*) FROM reactions WHERE message_id = ?1",
            rusqlite::params![message_id],
            |r| r.get(0),
        )
        .unwrap()
}

#[test]
fn test_toggle_adds_then_removes() {
    let store = test_store();
    let c = chat::ensure_direct_chat(&store.conn, "a", "b").unwrap();
    let m = chat::send_message(&store.conn, &c.id, "a", "hi").unwrap();

    assert!(chat::toggle_reaction(&store.conn, &m.id, "b", "❤️").unwrap());
    assert_eq!(reaction_count(&store, &m.id), 1);

    assert!(!chat::toggle_reaction(&store.conn, &m.id, "b", "❤️").unwrap());
    assert_eq!(reaction_count(&store, &m.id), 0);
}

#[test]
fn test_toggle_is_an_involution() {
    let store = test_store();
    let c = chat::ensure_direct_chat(&store.conn, "a", "b").unwrap();
    let m = chat::send_message(&store.conn, &c.id, "a", "hi").unwrap();

    chat::toggle_reaction(&store.conn, &m.id, "a", "👍").unwrap();
    let before = reaction_count(&store, &m.id);

    // Two identical toggles leave the set unchanged
    chat::toggle_reaction(&store.conn, &m.id, "b", "👍").unwrap();
    chat::toggle_reaction(&store.conn, &m.id, "b", "👍").unwrap();
    assert_eq!(reaction_count(&store, &m.id), before);
}

#[test]
fn test_distinct_emoji_and_users_coexist() {
    let store = test_store();
    let c = chat::ensure_direct_chat(&store.conn, "a", "b").unwrap();
    let m = chat::send_message(&store.conn, &c.id, "a", "hi").unwrap();

    chat::toggle_reaction(&store.conn, &m.id, "a", "👍").unwrap();
    chat::toggle_reaction(&store.conn, &m.id, "b", "👍").unwrap();
    chat::toggle_reaction(&store.conn, &m.id, "b", "🔥").unwrap();
    assert_eq!(reaction_count(&store, &m.id), 3);
}
