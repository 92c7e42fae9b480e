use crate::common::test_store;
use kindred_server::error::CoreError;
use kindred_server::friends;
use kindred_server::models::FriendshipStatus;

#[test]
fn test_single_canonical_row_per_pair() {
    let store = test_store();
    friends::send_request(&store.conn, "zoe", "adam").unwrap();

    let f = friends::get_friendship(&store.conn, "adam", "zoe").unwrap().unwrap();
    assert_eq!(f.user1, "adam");
    assert_eq!(f.user2, "zoe");
    assert!(f.user1 < f.user2);
    assert_eq!(f.sender, "zoe");

    // A second request over the pending row is a conflict (state already right)
    assert!(matches!(
        friends::send_request(&store.conn, "adam", "zoe").unwrap_err(),
        CoreError::Conflict
    ));
    let count: i64 = store
        .conn
        .query_row("SELECT COUNT(*) FROM friendships", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_only_recipient_can_respond() {
    let store = test_store();
    friends::send_request(&store.conn, "a", "b").unwrap();

    assert!(matches!(
        friends::respond(&store.conn, "a", "b", true).unwrap_err(),
        CoreError::Forbidden(_)
    ));
    let f = friends::respond(&store.conn, "b", "a", true).unwrap();
    assert_eq!(f.status, FriendshipStatus::Accepted);
}

#[test]
fn test_decline_goes_inactive_and_can_repend() {
    let store = test_store();
    friends::send_request(&store.conn, "a", "b").unwrap();
    let f = friends::respond(&store.conn, "b", "a", false).unwrap();
    assert_eq!(f.status, FriendshipStatus::Inactive);

    // An inactive pair can be re-requested
    let f = friends::send_request(&store.conn, "b", "a").unwrap();
    assert_eq!(f.status, FriendshipStatus::Pending);
    assert_eq!(f.sender, "b");
}

#[test]
fn test_block_is_terminal_until_unblock() {
    let store = test_store();
    friends::send_request(&store.conn, "a", "b").unwrap();
    friends::respond(&store.conn, "b", "a", true).unwrap();

    friends::block(&store.conn, "a", "b").unwrap();
    assert!(friends::is_blocked_pair(&store.conn, "b", "a").unwrap());
    let f = friends::get_friendship(&store.conn, "a", "b").unwrap().unwrap();
    assert_eq!(f.status, FriendshipStatus::Blocked);

    // New requests bounce off the block, from either side
    assert!(matches!(
        friends::send_request(&store.conn, "b", "a").unwrap_err(),
        CoreError::Blocked
    ));
    assert!(matches!(
        friends::upsert_accepted(&store.conn, "a", "b").unwrap_err(),
        CoreError::Blocked
    ));

    friends::unblock(&store.conn, "a", "b").unwrap();
    assert!(!friends::is_blocked_pair(&store.conn, "a", "b").unwrap());
    let f = friends::get_friendship(&store.conn, "a", "b").unwrap().unwrap();
    assert_eq!(f.status, FriendshipStatus::Inactive);
}

#[test]
fn test_unblock_keeps_terminal_while_other_direction_blocked() {
    let store = test_store();
    friends::send_request(&store.conn, "a", "b").unwrap();
    friends::block(&store.conn, "a", "b").unwrap();
    friends::block(&store.conn, "b", "a").unwrap();

    friends::unblock(&store.conn, "a", "b").unwrap();
    // B's block still stands
    assert!(friends::is_blocked_pair(&store.conn, "a", "b").unwrap());
    let f = friends::get_friendship(&store.conn, "a", "b").unwrap().unwrap();
    assert_eq!(f.status, FriendshipStatus::Blocked);
}

#[test]
fn test_upsert_accepted_is_idempotent() {
    let store = test_store();
    friends::upsert_accepted(&store.conn, "x", "y").unwrap();
    friends::upsert_accepted(&store.conn, "y", "x").unwrap();

    let count: i64 = store
        .conn
        .query_row("SELECT COUNT(*) FROM friendships", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 1);
    let f = friends::get_friendship(&store.conn, "x", "y").unwrap().unwrap();
    assert_eq!(f.status, FriendshipStatus::Accepted);
}
