//! Blind-date sessions: anonymous chats that reveal only after enough
//! messages and reciprocal consent. Reveal flags only ever go false→true;
//! `revealed` requires both.

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::db::now_rfc3339;
use crate::error::{CoreError, CoreResult, classify_sqlite};
use crate::events::{ChatEvent, EventBus};
use crate::friends;
use crate::models::{BlindDateMatch, BlindDateStatus, DEFAULT_REVEAL_THRESHOLD};

/// An active match with no messages after this long gets one reminder.
pub const REMINDER_AFTER_SECS: i64 = 24 * 3600;

const MATCH_COLUMNS: &str = "id, user_a, user_b, status, message_count, reveal_threshold, \
     user_a_revealed, user_b_revealed, chat_id, matched_at, reminder_sent_at";

fn match_from_row(row: &Row) -> rusqlite::Result<BlindDateMatch> {
    let status: String = row.get(3)?;
    Ok(BlindDateMatch {
        id: row.get(0)?,
        user_a: row.get(1)?,
        user_b: row.get(2)?,
        status: BlindDateStatus::parse(&status),
        message_count: row.get(4)?,
        reveal_threshold: row.get(5)?,
        user_a_revealed: row.get(6)?,
        user_b_revealed: row.get(7)?,
        chat_id: row.get(8)?,
        matched_at: row.get(9)?,
        reminder_sent_at: row.get(10)?,
    })
}

pub fn create_match(conn: &Connection, a: &str, b: &str, chat_id: &str) -> CoreResult<BlindDateMatch> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO blind_date_matches (id, user_a, user_b, status, reveal_threshold, chat_id, matched_at)
         VALUES (?1, ?2, ?3, 'active', ?4, ?5, ?6)",
        params![&id, a, b, DEFAULT_REVEAL_THRESHOLD, chat_id, now_rfc3339()],
    )
    .map_err(classify_sqlite)?;
    get(conn, &id)
}

pub fn get(conn: &Connection, id: &str) -> CoreResult<BlindDateMatch> {
    conn.query_row(
        &format!("SELECT {MATCH_COLUMNS} FROM blind_date_matches WHERE id = ?1"),
        params![id],
        match_from_row,
    )
    .optional()
    .map_err(CoreError::TransientStore)?
    .ok_or(CoreError::NotFound("blind date match"))
}

/// The match owning a chat, if the chat belongs to one. The chat plane
/// consults this on every send.
pub fn get_by_chat(conn: &Connection, chat_id: &str) -> CoreResult<Option<BlindDateMatch>> {
    conn.query_row(
        &format!(
            "SELECT {MATCH_COLUMNS} FROM blind_date_matches WHERE chat_id = ?1
             ORDER BY matched_at DESC LIMIT 1"
        ),
        params![chat_id],
        match_from_row,
    )
    .optional()
    .map_err(CoreError::TransientStore)
}

/// Count one delivered (non-blocked, non-tombstoned) message toward the
/// reveal threshold. Only active matches count.
pub fn record_message(conn: &Connection, match_id: &str) -> CoreResult<()> {
    conn.execute(
        "UPDATE blind_date_matches SET message_count = message_count + 1
         WHERE id = ?1 AND status = 'active'",
        params![match_id],
    )
    .map_err(classify_sqlite)?;
    Ok(())
}

/// One side consents to reveal. Requires the message-count gate to be open.
/// When the second side consents the match transitions to `revealed`, an
/// accepted friendship lands, and both sides hear about it.
pub fn request_reveal(
    conn: &Connection,
    bus: &EventBus,
    match_id: &str,
    user_id: &str,
) -> CoreResult<BlindDateMatch> {
    let m = get(conn, match_id)?;
    if !m.involves(user_id) {
        return Err(CoreError::Forbidden("not part of this match"));
    }
    match m.status {
        BlindDateStatus::Ended => return Err(CoreError::Expired),
        BlindDateStatus::Revealed => return Ok(m),
        BlindDateStatus::Active => {}
    }
    if !m.reveal_available() {
        return Err(CoreError::BadRequest("reveal is not available yet"));
    }

    let column = if m.user_a == user_id { "user_a_revealed" } else { "user_b_revealed" };
    conn.execute(
        &format!("UPDATE blind_date_matches SET {column} = 1 WHERE id = ?1"),
        params![match_id],
    )
    .map_err(classify_sqlite)?;

    let m = get(conn, match_id)?;
    if m.user_a_revealed && m.user_b_revealed {
        conn.execute(
            "UPDATE blind_date_matches SET status = 'revealed' WHERE id = ?1",
            params![match_id],
        )
        .map_err(classify_sqlite)?;
        friends::upsert_accepted(conn, &m.user_a, &m.user_b)?;
        for user in [&m.user_a, &m.user_b] {
            bus.publish(ChatEvent::Revealed {
                to: user.clone(),
                match_id: match_id.to_string(),
                chat_id: m.chat_id.clone(),
            });
        }
    } else {
        bus.publish(ChatEvent::RevealRequested {
            to: m.other(user_id).to_string(),
            match_id: match_id.to_string(),
        });
    }
    get(conn, match_id)
}

/// Either side may end from any state; the chat goes read-only.
pub fn end_match(
    conn: &Connection,
    bus: &EventBus,
    match_id: &str,
    user_id: &str,
) -> CoreResult<BlindDateMatch> {
    let m = get(conn, match_id)?;
    if !m.involves(user_id) {
        return Err(CoreError::Forbidden("not part of this match"));
    }
    if m.status != BlindDateStatus::Ended {
        conn.execute(
            "UPDATE blind_date_matches SET status = 'ended' WHERE id = ?1",
            params![match_id],
        )
        .map_err(classify_sqlite)?;
        bus.publish(ChatEvent::BlindEnded {
            to: m.other(user_id).to_string(),
            match_id: match_id.to_string(),
        });
    }
    get(conn, match_id)
}

/// Reminder sweep: active matches older than a day with zero messages get
/// one nudge to both sides, marked so it never repeats.
pub fn run_reminder_sweep(conn: &Connection, bus: &EventBus) -> CoreResult<usize> {
    let cutoff = (chrono::Utc::now() - chrono::Duration::seconds(REMINDER_AFTER_SECS)).to_rfc3339();
    let stale: Vec<BlindDateMatch> = {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MATCH_COLUMNS} FROM blind_date_matches
                 WHERE status = 'active' AND message_count = 0
                   AND reminder_sent_at IS NULL AND matched_at <= ?1"
            ))
            .map_err(CoreError::TransientStore)?;
        stmt.query_map(params![&cutoff], match_from_row)
            .map_err(CoreError::TransientStore)?
            .filter_map(|r| r.ok())
            .collect()
    };

    let mut reminded = 0;
    for m in stale {
        conn.execute(
            "UPDATE blind_date_matches SET reminder_sent_at = ?2
             WHERE id = ?1 AND reminder_sent_at IS NULL",
            params![&m.id, now_rfc3339()],
        )
        .map_err(classify_sqlite)?;
        for user in [&m.user_a, &m.user_b] {
            bus.publish(ChatEvent::BlindReminder {
                to: user.clone(),
                match_id: m.id.clone(),
            });
        }
        reminded += 1;
    }
    Ok(reminded)
}
