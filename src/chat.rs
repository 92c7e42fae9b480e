//! Chat-plane persistence: 1:1 chats, messages with soft tombstones,
//! receipts, reactions, per-user clears, mute settings, and the inbox fold.
//! All functions take a `&Connection`; the gateway and the engines share
//! them.

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::blind_date;
use crate::db::now_rfc3339;
use crate::error::{CoreError, CoreResult, classify_sqlite};
use crate::friends;
use crate::models::{
    BlindDateStatus, Chat, DELETED_MESSAGE_TEXT, InboxEntry, InboxMessage, Message, MessageStatus,
    MuteSetting, ProfileSummary, ReceiptStatus,
};
use crate::pii;
use crate::profiles;

/// History page size served on `join`.
pub const HISTORY_LIMIT: i64 = 30;

fn message_from_row(row: &Row) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        sender: row.get(2)?,
        text: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        is_edited: row.get(6)?,
        is_deleted: row.get(7)?,
    })
}

const MESSAGE_COLUMNS: &str =
    "id, chat_id, sender, text, created_at, updated_at, is_edited, is_deleted";

/// Find the 1:1 chat between two users, creating it (chat plus both member
/// rows, atomically) when absent.
pub fn ensure_direct_chat(conn: &Connection, a: &str, b: &str) -> CoreResult<Chat> {
    let existing = conn
        .query_row(
            "SELECT c.id, c.created_at, c.last_message_at FROM chats c
             JOIN chat_members m1 ON m1.chat_id = c.id AND m1.user_id = ?1
             JOIN chat_members m2 ON m2.chat_id = c.id AND m2.user_id = ?2
             LIMIT 1",
            params![a, b],
            |row| {
                Ok(Chat {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    last_message_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(CoreError::TransientStore)?;
    if let Some(chat) = existing {
        return Ok(chat);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();
    let tx = conn
        .unchecked_transaction()
        .map_err(CoreError::TransientStore)?;
    tx.execute(
        "INSERT INTO chats (id, created_at) VALUES (?1, ?2)",
        params![&id, &now],
    )
    .map_err(classify_sqlite)?;
    tx.execute(
        "INSERT INTO chat_members (chat_id, user_id) VALUES (?1, ?2), (?1, ?3)",
        params![&id, a, b],
    )
    .map_err(classify_sqlite)?;
    tx.commit().map_err(CoreError::TransientStore)?;

    Ok(Chat {
        id,
        created_at: now,
        last_message_at: None,
    })
}

pub fn members(conn: &Connection, chat_id: &str) -> CoreResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT user_id FROM chat_members WHERE chat_id = ?1 ORDER BY user_id")
        .map_err(CoreError::TransientStore)?;
    let members: Vec<String> = stmt
        .query_map(params![chat_id], |row| row.get(0))
        .map_err(CoreError::TransientStore)?
        .filter_map(|r| r.ok())
        .collect();
    if members.is_empty() {
        return Err(CoreError::NotFound("chat"));
    }
    Ok(members)
}

pub fn is_member(conn: &Connection, chat_id: &str, user_id: &str) -> CoreResult<bool> {
    Ok(members(conn, chat_id)?.iter().any(|m| m == user_id))
}

/// Persist an outbound message after the policy checks: membership, block
/// in either direction, and the blind-date layer (PII filter while active,
/// read-only after end). Returns the stored message.
pub fn send_message(conn: &Connection, chat_id: &str, sender: &str, text: &str) -> CoreResult<Message> {
    let members = members(conn, chat_id)?;
    if !members.iter().any(|m| m == sender) {
        return Err(CoreError::Forbidden("not a chat member"));
    }
    if let Some(other) = members.iter().find(|m| *m != sender)
        && friends::is_blocked_pair(conn, sender, other)?
    {
        return Err(CoreError::Blocked);
    }

    let blind = blind_date::get_by_chat(conn, chat_id)?;
    if let Some(bd) = &blind {
        match bd.status {
            BlindDateStatus::Ended => return Err(CoreError::Forbidden("chat is closed")),
            BlindDateStatus::Active => {
                let verdict = pii::scan(text);
                if !verdict.allowed {
                    return Err(CoreError::PiiDetected(verdict.detected_types));
                }
            }
            BlindDateStatus::Revealed => {}
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO messages (id, chat_id, sender, text, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, chat_id, sender, text, &now],
    )
    .map_err(classify_sqlite)?;

    // last_message_at is monotonically non-decreasing
    conn.execute(
        "UPDATE chats SET last_message_at = MAX(COALESCE(last_message_at, ''), ?1) WHERE id = ?2",
        params![&now, chat_id],
    )
    .map_err(classify_sqlite)?;

    if let Some(bd) = &blind
        && bd.status == BlindDateStatus::Active
    {
        blind_date::record_message(conn, &bd.id)?;
    }

    Ok(Message {
        id,
        chat_id: chat_id.to_string(),
        sender: sender.to_string(),
        text: text.to_string(),
        created_at: now,
        updated_at: None,
        is_edited: false,
        is_deleted: false,
    })
}

/// Sender-only edit of a live message.
pub fn edit_message(
    conn: &Connection,
    message_id: &str,
    editor: &str,
    text: &str,
) -> CoreResult<Message> {
    let (sender, is_deleted): (String, bool) = conn
        .query_row(
            "SELECT sender, is_deleted FROM messages WHERE id = ?1",
            params![message_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
        .map_err(CoreError::TransientStore)?
        .ok_or(CoreError::NotFound("message"))?;
    if is_deleted {
        return Err(CoreError::NotFound("message"));
    }
    if sender != editor {
        return Err(CoreError::Forbidden("only the sender can edit a message"));
    }

    let now = now_rfc3339();
    conn.execute(
        "UPDATE messages SET text = ?1, is_edited = 1, updated_at = ?2 WHERE id = ?3",
        params![text, &now, message_id],
    )
    .map_err(classify_sqlite)?;
    get_message(conn, message_id)
}

/// Sender-only soft tombstone. The row survives with placeholder text and
/// never reappears in history.
pub fn delete_message(
    conn: &Connection,
    chat_id: &str,
    message_id: &str,
    deleter: &str,
) -> CoreResult<()> {
    let sender: String = conn
        .query_row(
            "SELECT sender FROM messages WHERE id = ?1 AND chat_id = ?2",
            params![message_id, chat_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(CoreError::TransientStore)?
        .ok_or(CoreError::NotFound("message"))?;
    if sender != deleter {
        return Err(CoreError::Forbidden("only the sender can delete a message"));
    }

    conn.execute(
        "UPDATE messages SET is_deleted = 1, text = ?1, updated_at = ?2 WHERE id = ?3",
        params![DELETED_MESSAGE_TEXT, now_rfc3339(), message_id],
    )
    .map_err(classify_sqlite)?;
    Ok(())
}

pub fn get_message(conn: &Connection, message_id: &str) -> CoreResult<Message> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
        params![message_id],
        message_from_row,
    )
    .optional()
    .map_err(CoreError::TransientStore)?
    .ok_or(CoreError::NotFound("message"))
}

/// The last `HISTORY_LIMIT` live messages visible to `user_id`: tombstones
/// out, everything at or before the user's clear cutoff out, chronological
/// order (created_at, then id).
pub fn history(conn: &Connection, chat_id: &str, user_id: &str) -> CoreResult<Vec<Message>> {
    let cutoff = clear_cutoff(conn, chat_id, user_id)?;
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE chat_id = ?1 AND is_deleted = 0 AND (?2 IS NULL OR created_at > ?2)
             ORDER BY created_at DESC, id DESC LIMIT ?3"
        ))
        .map_err(CoreError::TransientStore)?;
    let mut messages: Vec<Message> = stmt
        .query_map(params![chat_id, cutoff, HISTORY_LIMIT], message_from_row)
        .map_err(CoreError::TransientStore)?
        .filter_map(|r| r.ok())
        .collect();
    messages.reverse();
    Ok(messages)
}

/// Record a receipt. Receipts are never recorded for the sender against
/// their own message (silently a no-op); `read` implies `delivered`.
/// Duplicate upserts collide on the primary key and read as success.
/// Returns true when a new row landed.
pub fn upsert_receipt(
    conn: &Connection,
    message_id: &str,
    user_id: &str,
    status: ReceiptStatus,
) -> CoreResult<bool> {
    let sender: String = conn
        .query_row(
            "SELECT sender FROM messages WHERE id = ?1",
            params![message_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(CoreError::TransientStore)?
        .ok_or(CoreError::NotFound("message"))?;
    if sender == user_id {
        return Ok(false);
    }

    let now = now_rfc3339();
    let mut inserted = conn
        .execute(
            "INSERT OR IGNORE INTO receipts (message_id, user_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![message_id, user_id, status.as_str(), &now],
        )
        .map_err(CoreError::TransientStore)?;
    if status == ReceiptStatus::Read {
        inserted += conn
            .execute(
                "INSERT OR IGNORE INTO receipts (message_id, user_id, status, created_at)
                 VALUES (?1, ?2, 'delivered', ?3)",
                params![message_id, user_id, &now],
            )
            .map_err(CoreError::TransientStore)?;
    }
    Ok(inserted > 0)
}

/// Display status of a message: the fold over receipts from everyone but
/// the sender — read > delivered > sent.
pub fn message_status(conn: &Connection, message_id: &str, sender: &str) -> CoreResult<MessageStatus> {
    let mut stmt = conn
        .prepare("SELECT status FROM receipts WHERE message_id = ?1 AND user_id != ?2")
        .map_err(CoreError::TransientStore)?;
    let statuses: Vec<String> = stmt
        .query_map(params![message_id, sender], |r| r.get(0))
        .map_err(CoreError::TransientStore)?
        .filter_map(|r| r.ok())
        .collect();
    if statuses.iter().any(|s| s == "read") {
        Ok(MessageStatus::Read)
    } else if statuses.iter().any(|s| s == "delivered") {
        Ok(MessageStatus::Delivered)
    } else {
        Ok(MessageStatus::Sent)
    }
}

/// Add-or-remove a reaction; two identical toggles cancel out. Returns true
/// when the reaction was added, false when removed.
pub fn toggle_reaction(
    conn: &Connection,
    message_id: &str,
    user_id: &str,
    emoji: &str,
) -> CoreResult<bool> {
    let removed = conn
        .execute(
            "DELETE FROM reactions WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
            params![message_id, user_id, emoji],
        )
        .map_err(CoreError::TransientStore)?;
    if removed > 0 {
        return Ok(false);
    }
    conn.execute(
        "INSERT OR IGNORE INTO reactions (message_id, user_id, emoji, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![message_id, user_id, emoji, now_rfc3339()],
    )
    .map_err(CoreError::TransientStore)?;
    Ok(true)
}

/// Per-user logical clear: messages at or before this instant disappear
/// from this user's history and unread counts only.
pub fn clear_chat(conn: &Connection, chat_id: &str, user_id: &str) -> CoreResult<String> {
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO chat_deletions (chat_id, user_id, deleted_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(chat_id, user_id) DO UPDATE SET deleted_at = excluded.deleted_at",
        params![chat_id, user_id, &now],
    )
    .map_err(classify_sqlite)?;
    Ok(now)
}

pub fn clear_cutoff(conn: &Connection, chat_id: &str, user_id: &str) -> CoreResult<Option<String>> {
    conn.query_row(
        "SELECT deleted_at FROM chat_deletions WHERE chat_id = ?1 AND user_id = ?2",
        params![chat_id, user_id],
        |r| r.get(0),
    )
    .optional()
    .map_err(CoreError::TransientStore)
}

pub fn set_mute(
    conn: &Connection,
    user_id: &str,
    chat_id: &str,
    muted: bool,
    until: Option<&str>,
) -> CoreResult<MuteSetting> {
    conn.execute(
        "INSERT INTO mute_settings (user_id, chat_id, is_muted, muted_until) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id, chat_id) DO UPDATE SET
             is_muted = excluded.is_muted, muted_until = excluded.muted_until",
        params![user_id, chat_id, muted, until],
    )
    .map_err(classify_sqlite)?;
    Ok(MuteSetting {
        user_id: user_id.to_string(),
        chat_id: chat_id.to_string(),
        is_muted: muted,
        muted_until: until.map(str::to_string),
    })
}

/// Mute lookup with lazy expiry: a `muted_until` at or before now reads as
/// not muted and resets the row on the way out.
pub fn is_muted(conn: &Connection, user_id: &str, chat_id: &str) -> CoreResult<bool> {
    let row: Option<(bool, Option<String>)> = conn
        .query_row(
            "SELECT is_muted, muted_until FROM mute_settings WHERE user_id = ?1 AND chat_id = ?2",
            params![user_id, chat_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
        .map_err(CoreError::TransientStore)?;

    let Some((muted, until)) = row else {
        return Ok(false);
    };
    if !muted {
        return Ok(false);
    }
    let Some(until) = until else {
        return Ok(true);
    };

    let expired = chrono::DateTime::parse_from_rfc3339(&until)
        .map(|t| t.timestamp() <= chrono::Utc::now().timestamp())
        .unwrap_or(true);
    if expired {
        conn.execute(
            "UPDATE mute_settings SET is_muted = 0, muted_until = NULL
             WHERE user_id = ?1 AND chat_id = ?2",
            params![user_id, chat_id],
        )
        .map_err(classify_sqlite)?;
        return Ok(false);
    }
    Ok(true)
}

/// Unread messages for `user_id` in a chat: sent by someone else, live,
/// after the clear cutoff, with no read receipt from this user.
pub fn unread_count(conn: &Connection, chat_id: &str, user_id: &str) -> CoreResult<i64> {
    let cutoff = clear_cutoff(conn, chat_id, user_id)?;
    conn.query_row(
        "SELECT COUNT(*) FROM messages m
         WHERE m.chat_id = ?1 AND m.sender != ?2 AND m.is_deleted = 0
           AND (?3 IS NULL OR m.created_at > ?3)
           AND NOT EXISTS (SELECT 1 FROM receipts r
                           WHERE r.message_id = m.id AND r.user_id = ?2 AND r.status = 'read')",
        params![chat_id, user_id, cutoff],
        |r| r.get(0),
    )
    .map_err(CoreError::TransientStore)
}

/// The per-user inbox: every chat the user belongs to, with the last live
/// message after their cutoff, the receipt fold on it, the unread count,
/// the counterpart summary, and the mute flag. A cleared chat with nothing
/// newer is hidden entirely.
pub fn inbox(conn: &Connection, user_id: &str) -> CoreResult<Vec<InboxEntry>> {
    let chat_ids: Vec<String> = {
        let mut stmt = conn
            .prepare(
                "SELECT c.id FROM chats c
                 JOIN chat_members cm ON cm.chat_id = c.id AND cm.user_id = ?1
                 ORDER BY COALESCE(c.last_message_at, c.created_at) DESC",
            )
            .map_err(CoreError::TransientStore)?;
        stmt.query_map(params![user_id], |r| r.get(0))
            .map_err(CoreError::TransientStore)?
            .filter_map(|r| r.ok())
            .collect()
    };

    let mut entries = Vec::new();
    for chat_id in chat_ids {
        let cutoff = clear_cutoff(conn, &chat_id, user_id)?;
        let last = conn
            .query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE chat_id = ?1 AND is_deleted = 0 AND (?2 IS NULL OR created_at > ?2)
                     ORDER BY created_at DESC, id DESC LIMIT 1"
                ),
                params![&chat_id, cutoff],
                message_from_row,
            )
            .optional()
            .map_err(CoreError::TransientStore)?;

        if cutoff.is_some() && last.is_none() {
            continue;
        }

        let Some(other_id) = members(conn, &chat_id)?.into_iter().find(|m| m != user_id) else {
            continue;
        };
        let other_user = profiles::summary(conn, &other_id).unwrap_or(ProfileSummary {
            id: other_id.clone(),
            display_name: "Someone".to_string(),
            username: String::new(),
            age: 0,
            gender: String::new(),
        });

        let last_message = match last {
            Some(m) => {
                let status = message_status(conn, &m.id, &m.sender)?;
                Some(InboxMessage {
                    id: m.id,
                    sender: m.sender,
                    text: m.text,
                    created_at: m.created_at,
                    status,
                })
            }
            None => None,
        };

        entries.push(InboxEntry {
            unread_count: unread_count(conn, &chat_id, user_id)?,
            muted: is_muted(conn, user_id, &chat_id)?,
            chat_id,
            other_user,
            last_message,
        });
    }
    Ok(entries)
}
