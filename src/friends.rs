//! Friendships and blocks. One row per unordered pair, canonicalized so
//! `user1 < user2`; a tagged status plus the original sender is enough to
//! reconstruct direction.

use rusqlite::{Connection, params};

use crate::db::now_rfc3339;
use crate::error::{CoreError, CoreResult, classify_sqlite};
use crate::models::{Friendship, FriendshipStatus};

/// Canonical pair key: `(min, max)`.
pub fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a < b { (a, b) } else { (b, a) }
}

pub fn get_friendship(conn: &Connection, a: &str, b: &str) -> CoreResult<Option<Friendship>> {
    let (user1, user2) = canonical_pair(a, b);
    let row = conn
        .query_row(
            "SELECT user1, user2, sender, status, created_at, updated_at
             FROM friendships WHERE user1 = ?1 AND user2 = ?2",
            params![user1, user2],
            |row| {
                let status: String = row.get(3)?;
                Ok(Friendship {
                    user1: row.get(0)?,
                    user2: row.get(1)?,
                    sender: row.get(2)?,
                    status: FriendshipStatus::parse(&status),
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            },
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(CoreError::TransientStore(other)),
        })?;
    Ok(row)
}

/// Send a friend request. Re-sending over `pending` or `accepted` is a
/// conflict, which callers treat as the state already being right; a blocked
/// pair is refused.
pub fn send_request(conn: &Connection, from: &str, to: &str) -> CoreResult<Friendship> {
    if from == to {
        return Err(CoreError::BadRequest("cannot befriend yourself"));
    }
    if is_blocked_pair(conn, from, to)? {
        return Err(CoreError::Blocked);
    }

    let (user1, user2) = canonical_pair(from, to);
    let now = now_rfc3339();
    match get_friendship(conn, from, to)? {
        None => {
            conn.execute(
                "INSERT INTO friendships (user1, user2, sender, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'pending', ?4, ?4)",
                params![user1, user2, from, now],
            )
            .map_err(classify_sqlite)?;
        }
        Some(f) => match f.status {
            FriendshipStatus::Inactive => {
                conn.execute(
                    "UPDATE friendships SET sender = ?3, status = 'pending', updated_at = ?4
                     WHERE user1 = ?1 AND user2 = ?2",
                    params![user1, user2, from, now],
                )
                .map_err(classify_sqlite)?;
            }
            FriendshipStatus::Blocked => return Err(CoreError::Blocked),
            FriendshipStatus::Pending | FriendshipStatus::Accepted => {
                return Err(CoreError::Conflict);
            }
        },
    }
    get_friendship(conn, from, to)?.ok_or(CoreError::NotFound("friendship"))
}

/// Accept or decline a pending request. Only the non-sender may respond.
pub fn respond(conn: &Connection, user: &str, from: &str, accept: bool) -> CoreResult<Friendship> {
    let f = get_friendship(conn, user, from)?.ok_or(CoreError::NotFound("friendship"))?;
    if f.status != FriendshipStatus::Pending {
        return Err(CoreError::Conflict);
    }
    if f.sender == user {
        return Err(CoreError::Forbidden("cannot respond to your own request"));
    }
    let status = if accept {
        FriendshipStatus::Accepted
    } else {
        FriendshipStatus::Inactive
    };
    set_status(conn, user, from, status)?;
    get_friendship(conn, user, from)?.ok_or(CoreError::NotFound("friendship"))
}

/// Force a pair to `accepted` — the path taken by mutual matchmaking
/// acceptance and blind-date reveals. Idempotent.
pub fn upsert_accepted(conn: &Connection, a: &str, b: &str) -> CoreResult<()> {
    let (user1, user2) = canonical_pair(a, b);
    let now = now_rfc3339();
    let changed = conn
        .execute(
            "INSERT INTO friendships (user1, user2, sender, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'accepted', ?4, ?4)
             ON CONFLICT(user1, user2) DO UPDATE SET status = 'accepted', updated_at = excluded.updated_at
             WHERE friendships.status != 'blocked'",
            params![user1, user2, a, now],
        )
        .map_err(classify_sqlite)?;
    if changed == 0 {
        return Err(CoreError::Blocked);
    }
    Ok(())
}

pub fn unfriend(conn: &Connection, a: &str, b: &str) -> CoreResult<()> {
    set_status(conn, a, b, FriendshipStatus::Inactive)
}

fn set_status(conn: &Connection, a: &str, b: &str, status: FriendshipStatus) -> CoreResult<()> {
    let (user1, user2) = canonical_pair(a, b);
    conn.execute(
        "UPDATE friendships SET status = ?3, updated_at = ?4 WHERE user1 = ?1 AND user2 = ?2",
        params![user1, user2, status.as_str(), now_rfc3339()],
    )
    .map_err(classify_sqlite)?;
    Ok(())
}

/// Record a block. The friendship row (if any) goes terminal until an
/// explicit unblock.
pub fn block(conn: &Connection, blocker: &str, blocked: &str) -> CoreResult<()> {
    let now = now_rfc3339();
    match conn.execute(
        "INSERT INTO blocks (blocker, blocked, created_at) VALUES (?1, ?2, ?3)",
        params![blocker, blocked, now],
    ) {
        Ok(_) => {}
        Err(e) => match classify_sqlite(e) {
            CoreError::Conflict => {} // already blocked
            other => return Err(other),
        },
    }
    if get_friendship(conn, blocker, blocked)?.is_some() {
        set_status(conn, blocker, blocked, FriendshipStatus::Blocked)?;
    }
    Ok(())
}

/// Remove a block. The friendship row returns to `inactive` only once
/// neither direction is blocked.
pub fn unblock(conn: &Connection, blocker: &str, blocked: &str) -> CoreResult<()> {
    conn.execute(
        "DELETE FROM blocks WHERE blocker = ?1 AND blocked = ?2",
        params![blocker, blocked],
    )
    .map_err(classify_sqlite)?;
    if !is_blocked_pair(conn, blocker, blocked)?
        && let Some(f) = get_friendship(conn, blocker, blocked)?
        && f.status == FriendshipStatus::Blocked
    {
        set_status(conn, blocker, blocked, FriendshipStatus::Inactive)?;
    }
    Ok(())
}

/// True when a block exists in either direction.
pub fn is_blocked_pair(conn: &Connection, a: &str, b: &str) -> CoreResult<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM blocks
             WHERE (blocker = ?1 AND blocked = ?2) OR (blocker = ?2 AND blocked = ?1)",
            params![a, b],
            |r| r.get(0),
        )
        .map_err(CoreError::TransientStore)?;
    Ok(count > 0)
}

/// Discovery visibility for a candidate pair: no block either way, both
/// profiles present and neither suspended nor tombstoned.
pub fn mutual_visibility(conn: &Connection, a: &str, b: &str) -> CoreResult<bool> {
    if is_blocked_pair(conn, a, b)? {
        return Ok(false);
    }
    let visible: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM profiles
             WHERE id IN (?1, ?2) AND suspended = 0 AND deleted = 0",
            params![a, b],
            |r| r.get(0),
        )
        .map_err(CoreError::TransientStore)?;
    Ok(visible == 2)
}
