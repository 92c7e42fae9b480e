use crate::common::test_store;
use kindred_server::chat;
use kindred_server::models::{MessageStatus, ReceiptStatus};

#[test]
fn test_at_most_one_receipt_per_status() {
    let store = test_store();
    let c = chat::ensure_direct_chat(&store.conn, "a", "b").unwrap();
    let m = chat::send_message(&store.conn, &c.id, "a", "hi").unwrap();

    assert!(chat::upsert_receipt(&store.conn, &m.id, "b", ReceiptStatus::Delivered).unwrap());
    // The duplicate collides on the unique key and reads as success
    assert!(!chat::upsert_receipt(&store.conn, &m.id, "b", ReceiptStatus::Delivered).unwrap());

    let count: i64 = store
        .conn
        .query_row(
            "SELECT COUNT(*) FROM receipts WHERE message_id = ?1 AND user_id = 'b'",
            rusqlite::params![m.id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_read_implies_delivered() {
    let store = test_store();
    let c = chat::ensure_direct_chat(&store.conn, "a", "b").unwrap();
    let m = chat::send_message(&store.conn, &c.id, "a", "hi").unwrap();

    chat::upsert_receipt(&store.conn, &m.id, "b", ReceiptStatus::Read).unwrap();

    let statuses: Vec<String> = {
        let mut stmt = store
            .conn
            .prepare("SELECT status FROM receipts WHERE message_id = ?1 AND user_id = 'b' ORDER BY status")
            .unwrap();
        stmt.query_map(rusqlite::params![m.id], |r| r.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    };
    assert_eq!(statuses, vec!["delivered".to_string(), "read".to_string()]);
}

#[test]
fn test_no_receipt_for_own_message() {
    let store = test_store();
    let c = chat::ensure_direct_chat(&store.conn, "a", "b").unwrap();
    let m = chat::send_message(&store.conn, &c.id, "a", "hi").unwrap();

    assert!(!chat::upsert_receipt(&store.conn, &m.id, "a", ReceiptStatus::Read).unwrap());
    let count: i64 = store
        .conn
        .query_row(
            "SELECT COUNT(*) FROM receipts WHERE message_id = ?1",
            rusqlite::params![m.id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_status_fold_read_beats_delivered() {
    let store = test_store();
    let c = chat::ensure_direct_chat(&store.conn, "a", "b").unwrap();
    let m = chat::send_message(&store.conn, &c.id, "a", "hi").unwrap();

    assert_eq!(
        chat::message_status(&store.conn, &m.id, "a").unwrap(),
        MessageStatus::Sent
    );

    chat::upsert_receipt(&store.conn, &m.id, "b", ReceiptStatus::Delivered).unwrap();
    assert_eq!(
        chat::message_status(&store.conn, &m.id, "a").unwrap(),
        MessageStatus::Delivered
    );

    chat::upsert_receipt(&store.conn, &m.id, "b", ReceiptStatus::Read).unwrap();
    assert_eq!(
        chat::message_status(&store.conn, &m.id, "a").unwrap(),
        MessageStatus::Read
    );
}
