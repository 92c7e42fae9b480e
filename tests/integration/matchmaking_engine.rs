use crate::common::{create_user_full, test_store};
use kindred_server::db::now_epoch;
use kindred_server::events::{ChatEvent, EventBus};
use kindred_server::friends;
use kindred_server::matchmaking;
use kindred_server::models::{FriendshipStatus, MatchCriteria, ProposalStatus};

fn criteria(interests: &[&str]) -> MatchCriteria {
    serde_json::from_value(serde_json::json!({
        "gender": "any",
        "age_min": 18,
        "age_max": 99,
        "interests": interests,
    }))
    .unwrap()
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut out = Vec::new();
    while let Ok(e) = rx.try_recv() {
        out.push(e);
    }
    out
}

fn ticket_count(store: &crate::common::TestStore) -> i64 {
    store
        .conn
        .query_row("SELECT COUNT(*) FROM matchmaking_tickets", [], |r| r.get(0))
        .unwrap()
}

// S2 — two compatible tickets, one proposal, mutual accept.
#[test]
fn test_scenario_mutual_match() {
    let store = test_store();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();

    create_user_full(&store.conn, "t1", "tina", 25, "f", &["music", "travel"]);
    create_user_full(&store.conn, "t2", "tom", 27, "m", &["travel", "books"]);
    matchmaking::enqueue(&store.conn, "t1", &criteria(&["music", "travel"])).unwrap();
    matchmaking::enqueue(&store.conn, "t2", &criteria(&["travel", "books"])).unwrap();

    let outcome = matchmaking::run_pass(&store.conn, &bus, "worker-1").unwrap();
    assert_eq!(outcome.proposed, 1);

    let events = drain(&mut rx);
    let proposals: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ChatEvent::Proposal { to, proposal } => Some((to.clone(), proposal.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(proposals.len(), 2);
    let proposal = &proposals[0].1;

    // First acceptance leaves the proposal pending
    let first = matchmaking::accept_proposal(&store.conn, &bus, "t1", &proposal.id).unwrap();
    assert!(first.is_none());

    // Second acceptance finalizes: chat, friendship, tickets gone
    let chat_id = matchmaking::accept_proposal(&store.conn, &bus, "t2", &proposal.id)
        .unwrap()
        .expect("finalized");

    let members = kindred_server::chat::members(&store.conn, &chat_id).unwrap();
    assert_eq!(members, vec!["t1".to_string(), "t2".to_string()]);

    let f = friends::get_friendship(&store.conn, "t1", "t2").unwrap().unwrap();
    assert_eq!(f.status, FriendshipStatus::Accepted);
    let friendship_count: i64 = store
        .conn
        .query_row("SELECT COUNT(*) FROM friendships", [], |r| r.get(0))
        .unwrap();
    assert_eq!(friendship_count, 1);

    assert_eq!(ticket_count(&store), 0);

    let matched: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            ChatEvent::Matched { to, chat_id: c, .. } => Some((to, c)),
            _ => None,
        })
        .collect();
    assert_eq!(matched.len(), 2);
    assert!(matched.iter().all(|(_, c)| c == &chat_id));

    // Accepting again is a no-op returning the same chat id
    let again = matchmaking::accept_proposal(&store.conn, &bus, "t1", &proposal.id).unwrap();
    assert_eq!(again, Some(chat_id));
}

#[test]
fn test_enqueue_then_cancel_leaves_no_ticket() {
    let store = test_store();
    let bus = EventBus::new();
    create_user_full(&store.conn, "u", "uma", 30, "f", &[]);

    matchmaking::enqueue(&store.conn, "u", &criteria(&[])).unwrap();
    matchmaking::cancel(&store.conn, &bus, "u").unwrap();
    assert_eq!(ticket_count(&store), 0);
}

#[test]
fn test_enqueue_is_idempotent_and_keeps_queue_position() {
    let store = test_store();
    create_user_full(&store.conn, "u", "uma", 30, "f", &[]);

    matchmaking::enqueue(&store.conn, "u", &criteria(&["music"])).unwrap();
    store
        .conn
        .execute(
            "UPDATE matchmaking_tickets SET queued_at = queued_at - 50, heartbeat_at = heartbeat_at - 50",
            [],
        )
        .unwrap();
    let before = matchmaking::get_ticket(&store.conn, "u").unwrap().unwrap();

    matchmaking::enqueue(&store.conn, "u", &criteria(&["books"])).unwrap();
    let after = matchmaking::get_ticket(&store.conn, "u").unwrap().unwrap();

    assert_eq!(ticket_count(&store), 1);
    assert_eq!(after.queued_at, before.queued_at);
    assert!(after.heartbeat_at > before.heartbeat_at);
    assert_eq!(after.criteria.interests, vec!["books".to_string()]);
}

#[test]
fn test_gender_filter_blocks_pairing() {
    let store = test_store();
    let bus = EventBus::new();
    create_user_full(&store.conn, "a", "ana", 25, "f", &["music"]);
    create_user_full(&store.conn, "b", "ben", 27, "m", &["music"]);

    let mut wants_f = criteria(&["music"]);
    wants_f.gender = "f".to_string();
    matchmaking::enqueue(&store.conn, "a", &wants_f).unwrap();
    matchmaking::enqueue(&store.conn, "b", &criteria(&["music"])).unwrap();

    // A wants f; B is m. No proposal either way (one side's filter fails).
    let outcome = matchmaking::run_pass(&store.conn, &bus, "w").unwrap();
    assert_eq!(outcome.proposed, 0);
}

#[test]
fn test_blocked_pair_never_proposed() {
    let store = test_store();
    let bus = EventBus::new();
    create_user_full(&store.conn, "a", "ana", 25, "f", &["music"]);
    create_user_full(&store.conn, "b", "ben", 27, "m", &["music"]);
    friends::block(&store.conn, "a", "b").unwrap();

    matchmaking::enqueue(&store.conn, "a", &criteria(&["music"])).unwrap();
    matchmaking::enqueue(&store.conn, "b", &criteria(&["music"])).unwrap();

    let outcome = matchmaking::run_pass(&store.conn, &bus, "w").unwrap();
    assert_eq!(outcome.proposed, 0);
}

#[test]
fn test_best_scoring_candidate_wins() {
    let store = test_store();
    let bus = EventBus::new();
    create_user_full(&store.conn, "seeker", "sam", 25, "m", &["music", "travel"]);
    create_user_full(&store.conn, "twin", "tia", 25, "f", &["music", "travel"]);
    create_user_full(&store.conn, "stranger", "stu", 25, "m", &["taxes"]);

    matchmaking::enqueue(&store.conn, "seeker", &criteria(&["music", "travel"])).unwrap();
    matchmaking::enqueue(&store.conn, "twin", &criteria(&["music", "travel"])).unwrap();
    matchmaking::enqueue(&store.conn, "stranger", &criteria(&["taxes"])).unwrap();
    // Seeker is oldest, so the pass considers them first
    store
        .conn
        .execute(
            "UPDATE matchmaking_tickets SET queued_at = queued_at - 60 WHERE user_id = 'seeker'",
            [],
        )
        .unwrap();

    matchmaking::run_pass(&store.conn, &bus, "w").unwrap();

    let pair: (String, String) = store
        .conn
        .query_row(
            "SELECT user_a, user_b FROM match_proposals WHERE status = 'open'
             AND (user_a = 'seeker' OR user_b = 'seeker')",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert!(pair.0 == "twin" || pair.1 == "twin");
}

#[test]
fn test_proposal_expires_at_exactly_thirty_seconds() {
    let store = test_store();
    let bus = EventBus::new();
    create_user_full(&store.conn, "a", "ana", 25, "f", &["music"]);
    create_user_full(&store.conn, "b", "ben", 27, "m", &["music"]);
    matchmaking::enqueue(&store.conn, "a", &criteria(&["music"])).unwrap();
    matchmaking::enqueue(&store.conn, "b", &criteria(&["music"])).unwrap();
    matchmaking::run_pass(&store.conn, &bus, "w").unwrap();

    let id: String = store
        .conn
        .query_row("SELECT id FROM match_proposals", [], |r| r.get(0))
        .unwrap();

    // 29 s old: still open on the next pass
    store
        .conn
        .execute(
            "UPDATE match_proposals SET created_at = ?1",
            rusqlite::params![now_epoch() - 29],
        )
        .unwrap();
    let outcome = matchmaking::run_pass(&store.conn, &bus, "w").unwrap();
    assert_eq!(outcome.expired_proposals, 0);
    assert_eq!(
        matchmaking::get_proposal(&store.conn, &id).unwrap().status,
        ProposalStatus::Open
    );

    // Exactly 30 s old: expires on this pass
    store
        .conn
        .execute(
            "UPDATE match_proposals SET created_at = ?1 WHERE id = ?2",
            rusqlite::params![now_epoch() - 30, id],
        )
        .unwrap();
    let outcome = matchmaking::run_pass(&store.conn, &bus, "w").unwrap();
    assert_eq!(outcome.expired_proposals, 1);
    assert_eq!(
        matchmaking::get_proposal(&store.conn, &id).unwrap().status,
        ProposalStatus::Expired
    );
    // Both tickets live again, back of the queue
    assert_eq!(ticket_count(&store), 2);
}

#[test]
fn test_reject_requeues_both() {
    let store = test_store();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    create_user_full(&store.conn, "a", "ana", 25, "f", &["music"]);
    create_user_full(&store.conn, "b", "ben", 27, "m", &["music"]);
    matchmaking::enqueue(&store.conn, "a", &criteria(&["music"])).unwrap();
    matchmaking::enqueue(&store.conn, "b", &criteria(&["music"])).unwrap();
    matchmaking::run_pass(&store.conn, &bus, "w").unwrap();
    drain(&mut rx);

    let id: String = store
        .conn
        .query_row("SELECT id FROM match_proposals", [], |r| r.get(0))
        .unwrap();
    matchmaking::reject_proposal(&store.conn, &bus, "a", &id).unwrap();

    assert_eq!(
        matchmaking::get_proposal(&store.conn, &id).unwrap().status,
        ProposalStatus::Rejected
    );
    assert_eq!(ticket_count(&store), 2);
    let requeued = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, ChatEvent::Requeued { .. }))
        .count();
    assert_eq!(requeued, 2);
}

#[test]
fn test_cancel_with_open_proposal_requeues_other_side() {
    let store = test_store();
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    create_user_full(&store.conn, "a", "ana", 25, "f", &["music"]);
    create_user_full(&store.conn, "b", "ben", 27, "m", &["music"]);
    matchmaking::enqueue(&store.conn, "a", &criteria(&["music"])).unwrap();
    matchmaking::enqueue(&store.conn, "b", &criteria(&["music"])).unwrap();
    matchmaking::run_pass(&store.conn, &bus, "w").unwrap();
    drain(&mut rx);

    matchmaking::cancel(&store.conn, &bus, "a").unwrap();

    assert_eq!(ticket_count(&store), 1);
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, ChatEvent::Requeued { to } if to == "b")));
}

#[test]
fn test_stale_tickets_drop_out() {
    let store = test_store();
    let bus = EventBus::new();
    create_user_full(&store.conn, "a", "ana", 25, "f", &[]);
    matchmaking::enqueue(&store.conn, "a", &criteria(&[])).unwrap();
    store
        .conn
        .execute(
            "UPDATE matchmaking_tickets SET heartbeat_at = ?1",
            rusqlite::params![now_epoch() - matchmaking::TICKET_STALE_SECS - 1],
        )
        .unwrap();

    let outcome = matchmaking::run_pass(&store.conn, &bus, "w").unwrap();
    assert_eq!(outcome.dropped_tickets, 1);
    assert_eq!(ticket_count(&store), 0);
}

#[test]
fn test_blind_tickets_pair_into_blind_date() {
    let store = test_store();
    let bus = EventBus::new();
    create_user_full(&store.conn, "a", "ana", 25, "f", &["music"]);
    create_user_full(&store.conn, "b", "ben", 27, "m", &["music"]);

    let mut blind = criteria(&["music"]);
    blind.blind = true;
    matchmaking::enqueue(&store.conn, "a", &blind).unwrap();
    matchmaking::enqueue(&store.conn, "b", &blind).unwrap();

    matchmaking::run_pass(&store.conn, &bus, "w").unwrap();
    let id: String = store
        .conn
        .query_row("SELECT id FROM match_proposals", [], |r| r.get(0))
        .unwrap();

    matchmaking::accept_proposal(&store.conn, &bus, "a", &id).unwrap();
    let chat_id = matchmaking::accept_proposal(&store.conn, &bus, "b", &id)
        .unwrap()
        .expect("finalized");

    // Blind pairs get a session, not a friendship (that comes at reveal)
    let bd = kindred_server::blind_date::get_by_chat(&store.conn, &chat_id)
        .unwrap()
        .expect("blind date created");
    assert!(bd.involves("a") && bd.involves("b"));
    assert!(friends::get_friendship(&store.conn, "a", "b").unwrap().is_none());
}

#[test]
fn test_blind_and_regular_tickets_never_mix() {
    let store = test_store();
    let bus = EventBus::new();
    create_user_full(&store.conn, "a", "ana", 25, "f", &["music"]);
    create_user_full(&store.conn, "b", "ben", 27, "m", &["music"]);

    let mut blind = criteria(&["music"]);
    blind.blind = true;
    matchmaking::enqueue(&store.conn, "a", &blind).unwrap();
    matchmaking::enqueue(&store.conn, "b", &criteria(&["music"])).unwrap();

    let outcome = matchmaking::run_pass(&store.conn, &bus, "w").unwrap();
    assert_eq!(outcome.proposed, 0);
}
