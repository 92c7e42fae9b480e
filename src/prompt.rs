//! Prompt-based help matching: receivers publish a prompt, the serial
//! fan-out loop offers it to one ranked giver at a time. The load-bearing
//! invariant: a request never has more than one pending attempt.

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::chat;
use crate::db::{decode_embedding, decode_strings, encode_embedding, encode_strings, now_epoch, now_rfc3339};
use crate::error::{CoreError, CoreResult, classify_sqlite};
use crate::events::{ChatEvent, EventBus};
use crate::friends;
use crate::models::{
    AttemptStatus, GiverAttempt, GiverProfile, HelpRequest, HelpRequestStatus, UpsertGiver,
};
use crate::scorer;

/// Response window for a single offer (seconds).
pub const ATTEMPT_WINDOW_SECS: i64 = 60;
/// Total lifetime of a help request (seconds).
pub const REQUEST_TTL_SECS: i64 = 3600;

// --- Giver profiles ---

const GIVER_COLUMNS: &str =
    "user_id, skills, categories, embedding, total_helps, average_rating, available, updated_at";

fn giver_from_row(row: &Row) -> rusqlite::Result<GiverProfile> {
    let skills: String = row.get(1)?;
    let categories: String = row.get(2)?;
    let embedding: String = row.get(3)?;
    Ok(GiverProfile {
        user_id: row.get(0)?,
        skills: decode_strings(&skills),
        categories: decode_strings(&categories),
        embedding: decode_embedding(&embedding),
        total_helps: row.get(4)?,
        average_rating: row.get(5)?,
        available: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub fn get_giver(conn: &Connection, user_id: &str) -> CoreResult<Option<GiverProfile>> {
    conn.query_row(
        &format!("SELECT {GIVER_COLUMNS} FROM giver_profiles WHERE user_id = ?1"),
        params![user_id],
        giver_from_row,
    )
    .optional()
    .map_err(CoreError::TransientStore)
}

/// Create or update a giver's availability. The embedding is regenerated
/// from the giver text (skills, categories, profile about/interests/needs).
pub fn upsert_giver(conn: &Connection, user_id: &str, body: &UpsertGiver) -> CoreResult<GiverProfile> {
    let embedding = scorer::embed(&giver_text(conn, user_id, &body.skills, &body.categories));
    conn.execute(
        "INSERT INTO giver_profiles (user_id, skills, categories, embedding, available, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id) DO UPDATE SET
             skills = excluded.skills, categories = excluded.categories,
             embedding = excluded.embedding, available = excluded.available,
             updated_at = excluded.updated_at",
        params![
            user_id,
            encode_strings(&body.skills),
            encode_strings(&body.categories),
            encode_embedding(&embedding),
            body.available,
            now_rfc3339(),
        ],
    )
    .map_err(classify_sqlite)?;
    get_giver(conn, user_id)?.ok_or(CoreError::NotFound("giver profile"))
}

/// Regenerate a giver's embedding after their profile text changed.
/// No-op for users who never registered as givers.
pub fn refresh_giver_embedding(conn: &Connection, user_id: &str) -> CoreResult<()> {
    let Some(giver) = get_giver(conn, user_id)? else {
        return Ok(());
    };
    let embedding = scorer::embed(&giver_text(conn, user_id, &giver.skills, &giver.categories));
    conn.execute(
        "UPDATE giver_profiles SET embedding = ?1, updated_at = ?2 WHERE user_id = ?3",
        params![encode_embedding(&embedding), now_rfc3339(), user_id],
    )
    .map_err(classify_sqlite)?;
    Ok(())
}

fn giver_text(conn: &Connection, user_id: &str, skills: &[String], categories: &[String]) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.extend(skills.iter().cloned());
    parts.extend(categories.iter().cloned());
    if let Ok(profile) = crate::profiles::get_profile(conn, user_id) {
        parts.push(profile.about);
        parts.extend(profile.interests);
        parts.extend(profile.needs);
    }
    parts.join(" ")
}

// --- Requests ---

const REQUEST_COLUMNS: &str = "id, receiver, prompt, embedding, status, attempts, declined, \
     matched_giver, chat_id, created_at, expires_at";

fn request_from_row(row: &Row) -> rusqlite::Result<HelpRequest> {
    let embedding: String = row.get(3)?;
    let status: String = row.get(4)?;
    let declined: String = row.get(6)?;
    Ok(HelpRequest {
        id: row.get(0)?,
        receiver: row.get(1)?,
        prompt: row.get(2)?,
        embedding: decode_embedding(&embedding),
        status: HelpRequestStatus::parse(&status),
        attempts: row.get(5)?,
        declined: decode_strings(&declined),
        matched_giver: row.get(7)?,
        chat_id: row.get(8)?,
        created_at: row.get(9)?,
        expires_at: row.get(10)?,
    })
}

pub fn get_request(conn: &Connection, id: &str) -> CoreResult<HelpRequest> {
    conn.query_row(
        &format!("SELECT {REQUEST_COLUMNS} FROM help_requests WHERE id = ?1"),
        params![id],
        request_from_row,
    )
    .optional()
    .map_err(CoreError::TransientStore)?
    .ok_or(CoreError::NotFound("help request"))
}

/// Publish a receiver prompt. The embedding is computed up front; the
/// fan-out loop picks it up on its next tick.
pub fn publish_request(conn: &Connection, receiver: &str, prompt: &str) -> CoreResult<HelpRequest> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(CoreError::BadRequest("prompt must not be empty"));
    }
    crate::profiles::get_active_profile(conn, receiver)?;

    let id = uuid::Uuid::new_v4().to_string();
    let embedding = scorer::embed(prompt);
    let now = now_epoch();
    conn.execute(
        "INSERT INTO help_requests (id, receiver, prompt, embedding, status, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, 'searching', ?5, ?6)",
        params![
            &id,
            receiver,
            prompt,
            encode_embedding(&embedding),
            now_rfc3339(),
            now + REQUEST_TTL_SECS,
        ],
    )
    .map_err(classify_sqlite)?;
    get_request(conn, &id)
}

/// A giver answers their pending offer. Accept matches the request and
/// creates the chat; decline adds them to the decline-set and frees the
/// next tick to offer elsewhere.
pub fn respond(
    conn: &Connection,
    bus: &EventBus,
    request_id: &str,
    giver: &str,
    accepted: bool,
) -> CoreResult<HelpRequest> {
    let request = get_request(conn, request_id)?;
    let attempt = get_attempt(conn, request_id, giver)?.ok_or(CoreError::NotFound("attempt"))?;
    if attempt.status != AttemptStatus::Pending {
        return Err(CoreError::Expired);
    }
    if request.status != HelpRequestStatus::Searching {
        return Err(CoreError::Expired);
    }

    let now = now_epoch();
    let status = if accepted { AttemptStatus::Accepted } else { AttemptStatus::Declined };
    conn.execute(
        "UPDATE giver_attempts SET status = ?3, responded_at = ?4
         WHERE request_id = ?1 AND giver = ?2",
        params![request_id, giver, status.as_str(), now],
    )
    .map_err(classify_sqlite)?;

    if accepted {
        let chat = chat::ensure_direct_chat(conn, &request.receiver, giver)?;
        conn.execute(
            "UPDATE help_requests SET status = 'matched', matched_giver = ?2, chat_id = ?3
             WHERE id = ?1",
            params![request_id, giver, &chat.id],
        )
        .map_err(classify_sqlite)?;
        conn.execute(
            "UPDATE giver_profiles SET total_helps = total_helps + 1 WHERE user_id = ?1",
            params![giver],
        )
        .map_err(classify_sqlite)?;
        for user in [request.receiver.as_str(), giver] {
            bus.publish(ChatEvent::HelpMatched {
                to: user.to_string(),
                request_id: request_id.to_string(),
                chat_id: chat.id.clone(),
            });
        }
    } else {
        add_declined(conn, request_id, giver)?;
    }
    get_request(conn, request_id)
}

/// Receiver cancels. Pending offers expire immediately so no giver is left
/// holding a dead prompt.
pub fn cancel_request(conn: &Connection, request_id: &str, receiver: &str) -> CoreResult<()> {
    let request = get_request(conn, request_id)?;
    if request.receiver != receiver {
        return Err(CoreError::Forbidden("not your request"));
    }
    conn.execute(
        "UPDATE help_requests SET status = 'cancelled' WHERE id = ?1",
        params![request_id],
    )
    .map_err(classify_sqlite)?;
    expire_pending_attempts(conn, request_id)?;
    Ok(())
}

/// Receiver marks a matched request done.
pub fn complete_request(conn: &Connection, request_id: &str, receiver: &str) -> CoreResult<()> {
    let request = get_request(conn, request_id)?;
    if request.receiver != receiver {
        return Err(CoreError::Forbidden("not your request"));
    }
    if request.status != HelpRequestStatus::Matched {
        return Err(CoreError::Conflict);
    }
    conn.execute(
        "UPDATE help_requests SET status = 'completed' WHERE id = ?1",
        params![request_id],
    )
    .map_err(classify_sqlite)?;
    Ok(())
}

pub fn get_attempt(
    conn: &Connection,
    request_id: &str,
    giver: &str,
) -> CoreResult<Option<GiverAttempt>> {
    conn.query_row(
        "SELECT request_id, giver, status, sent_at, responded_at FROM giver_attempts
         WHERE request_id = ?1 AND giver = ?2",
        params![request_id, giver],
        attempt_from_row,
    )
    .optional()
    .map_err(CoreError::TransientStore)
}

fn attempt_from_row(row: &Row) -> rusqlite::Result<GiverAttempt> {
    let status: String = row.get(2)?;
    Ok(GiverAttempt {
        request_id: row.get(0)?,
        giver: row.get(1)?,
        status: AttemptStatus::parse(&status),
        sent_at: row.get(3)?,
        responded_at: row.get(4)?,
    })
}

pub fn pending_attempt_count(conn: &Connection, request_id: &str) -> CoreResult<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM giver_attempts WHERE request_id = ?1 AND status = 'pending'",
        params![request_id],
        |r| r.get(0),
    )
    .map_err(CoreError::TransientStore)
}

fn add_declined(conn: &Connection, request_id: &str, giver: &str) -> CoreResult<()> {
    let request = get_request(conn, request_id)?;
    let mut declined = request.declined;
    if !declined.iter().any(|g| g == giver) {
        declined.push(giver.to_string());
    }
    conn.execute(
        "UPDATE help_requests SET declined = ?2 WHERE id = ?1",
        params![request_id, encode_strings(&declined)],
    )
    .map_err(classify_sqlite)?;
    Ok(())
}

fn expire_pending_attempts(conn: &Connection, request_id: &str) -> CoreResult<()> {
    conn.execute(
        "UPDATE giver_attempts SET status = 'expired', responded_at = ?2
         WHERE request_id = ?1 AND status = 'pending'",
        params![request_id, now_epoch()],
    )
    .map_err(classify_sqlite)?;
    Ok(())
}

// --- The serial fan-out tick ---

#[derive(Debug, Default)]
pub struct TickOutcome {
    pub offered: usize,
    pub expired_requests: usize,
    pub expired_attempts: usize,
    pub exhausted: usize,
}

/// One iteration of the fan-out loop, run under the prompt lease. For every
/// searching request: expire what is overdue, then — only if no pending
/// attempt remains — offer to the single best giver.
pub fn run_tick(conn: &Connection, bus: &EventBus) -> CoreResult<TickOutcome> {
    let mut outcome = TickOutcome::default();
    let now = now_epoch();

    // Attempts past their response window expire; the giver counts as declined.
    let overdue: Vec<(String, String)> = {
        let mut stmt = conn
            .prepare(
                "SELECT request_id, giver FROM giver_attempts
                 WHERE status = 'pending' AND sent_at + ?1 <= ?2",
            )
            .map_err(CoreError::TransientStore)?;
        stmt.query_map(params![ATTEMPT_WINDOW_SECS, now], |r| {
            Ok((r.get(0)?, r.get(1)?))
        })
        .map_err(CoreError::TransientStore)?
        .filter_map(|r| r.ok())
        .collect()
    };
    for (request_id, giver) in overdue {
        conn.execute(
            "UPDATE giver_attempts SET status = 'expired', responded_at = ?3
             WHERE request_id = ?1 AND giver = ?2 AND status = 'pending'",
            params![&request_id, &giver, now],
        )
        .map_err(classify_sqlite)?;
        add_declined(conn, &request_id, &giver)?;
        outcome.expired_attempts += 1;
    }

    let searching: Vec<HelpRequest> = {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {REQUEST_COLUMNS} FROM help_requests WHERE status = 'searching'
                 ORDER BY created_at ASC"
            ))
            .map_err(CoreError::TransientStore)?;
        stmt.query_map([], request_from_row)
            .map_err(CoreError::TransientStore)?
            .filter_map(|r| r.ok())
            .collect()
    };

    for request in searching {
        if request.expires_at <= now {
            conn.execute(
                "UPDATE help_requests SET status = 'expired' WHERE id = ?1",
                params![&request.id],
            )
            .map_err(classify_sqlite)?;
            expire_pending_attempts(conn, &request.id)?;
            bus.publish(ChatEvent::HelpStatus {
                to: request.receiver.clone(),
                request_id: request.id.clone(),
                status: "expired".to_string(),
            });
            outcome.expired_requests += 1;
            continue;
        }

        // Single-offer serialization: nothing new while an offer is out.
        if pending_attempt_count(conn, &request.id)? > 0 {
            continue;
        }

        match pick_candidate(conn, &request)? {
            Some(giver) => {
                conn.execute(
                    "INSERT OR IGNORE INTO giver_attempts (request_id, giver, status, sent_at)
                     VALUES (?1, ?2, 'pending', ?3)",
                    params![&request.id, &giver, now],
                )
                .map_err(classify_sqlite)?;
                conn.execute(
                    "UPDATE help_requests SET attempts = attempts + 1 WHERE id = ?1",
                    params![&request.id],
                )
                .map_err(classify_sqlite)?;
                bus.publish(ChatEvent::RequestOffered {
                    to: giver,
                    request_id: request.id.clone(),
                    prompt: request.prompt.clone(),
                });
                outcome.offered += 1;
            }
            None => {
                conn.execute(
                    "UPDATE help_requests SET status = 'declined_all' WHERE id = ?1",
                    params![&request.id],
                )
                .map_err(classify_sqlite)?;
                bus.publish(ChatEvent::HelpStatus {
                    to: request.receiver.clone(),
                    request_id: request.id.clone(),
                    status: "declined_all".to_string(),
                });
                outcome.exhausted += 1;
            }
        }
    }

    Ok(outcome)
}

/// The best giver for a request: cosine similarity against available giver
/// embeddings, excluding the receiver, the decline-set, anyone already tried
/// on this request, blocked pairs, and givers with a pending offer anywhere.
/// Order: similarity, then rating, then total helps.
fn pick_candidate(conn: &Connection, request: &HelpRequest) -> CoreResult<Option<String>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {GIVER_COLUMNS} FROM giver_profiles g
             WHERE g.available = 1 AND g.user_id != ?1
               AND NOT EXISTS (SELECT 1 FROM giver_attempts a
                               WHERE a.giver = g.user_id AND a.status = 'pending')
               AND NOT EXISTS (SELECT 1 FROM giver_attempts a
                               WHERE a.giver = g.user_id AND a.request_id = ?2)
               AND EXISTS (SELECT 1 FROM profiles p
                           WHERE p.id = g.user_id AND p.suspended = 0 AND p.deleted = 0)"
        ))
        .map_err(CoreError::TransientStore)?;
    let givers: Vec<GiverProfile> = stmt
        .query_map(params![&request.receiver, &request.id], giver_from_row)
        .map_err(CoreError::TransientStore)?
        .filter_map(|r| r.ok())
        .collect();

    let mut ranked: Vec<(f64, &GiverProfile)> = Vec::new();
    for giver in &givers {
        if request.declined.iter().any(|g| g == &giver.user_id) {
            continue;
        }
        if friends::is_blocked_pair(conn, &request.receiver, &giver.user_id)? {
            continue;
        }
        if giver.embedding.is_empty() {
            continue;
        }
        ranked.push((scorer::cosine(&request.embedding, &giver.embedding), giver));
    }

    ranked.sort_by(|(sa, ga), (sb, gb)| {
        sb.partial_cmp(sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                gb.average_rating
                    .partial_cmp(&ga.average_rating)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(gb.total_helps.cmp(&ga.total_helps))
            .then(ga.user_id.cmp(&gb.user_id))
    });

    Ok(ranked.first().map(|(_, g)| g.user_id.clone()))
}
