//! Matchmaking engine: a per-user ticket queue, a scored pairing pass that
//! runs under the matchmaking lease, and the proposal lifecycle through
//! mutual acceptance.

use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension, params};

use crate::coordinator;
use crate::db::now_epoch;
use crate::error::{CoreError, CoreResult, classify_sqlite};
use crate::events::{ChatEvent, EventBus};
use crate::friends;
use crate::models::{
    MatchCriteria, MatchProposal, MatchmakingTicket, Profile, ProposalStatus,
};
use crate::profiles::{self, profile_from_row};
use crate::scorer;
use crate::{blind_date, chat};

/// Acceptance window for a proposal (seconds).
pub const PROPOSAL_WINDOW_SECS: i64 = 30;
/// A ticket whose heartbeat is older than this is dropped by the pass.
pub const TICKET_STALE_SECS: i64 = 120;

const W_INTERESTS: f64 = 0.45;
const W_LOCATION: f64 = 0.30;
const W_RECIPROCITY: f64 = 0.15;
const W_FRESHNESS: f64 = 0.10;

// --- Contract operations ---

/// Put a user in the pool. Idempotent per user: an existing ticket keeps its
/// queue position but takes the new criteria and a fresh heartbeat.
pub fn enqueue(
    conn: &Connection,
    user_id: &str,
    criteria: &MatchCriteria,
) -> CoreResult<MatchmakingTicket> {
    profiles::get_active_profile(conn, user_id)?;
    let now = now_epoch();
    let criteria_json =
        serde_json::to_string(criteria).map_err(|_| CoreError::BadRequest("bad criteria"))?;
    conn.execute(
        "INSERT INTO matchmaking_tickets (user_id, criteria, queued_at, heartbeat_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(user_id) DO UPDATE SET
             criteria = excluded.criteria, heartbeat_at = excluded.heartbeat_at",
        params![user_id, criteria_json, now],
    )
    .map_err(classify_sqlite)?;
    get_ticket(conn, user_id)?.ok_or(CoreError::NotFound("ticket"))
}

/// Fallback criteria when a stored row fails to parse: match anyone adult.
fn open_criteria() -> MatchCriteria {
    MatchCriteria {
        gender: "any".to_string(),
        age_min: 18,
        age_max: 99,
        interests: Vec::new(),
        latitude: None,
        longitude: None,
        blind: false,
    }
}

pub fn get_ticket(conn: &Connection, user_id: &str) -> CoreResult<Option<MatchmakingTicket>> {
    conn.query_row(
        "SELECT user_id, criteria, queued_at, heartbeat_at FROM matchmaking_tickets WHERE user_id = ?1",
        params![user_id],
        |row| {
            let criteria: String = row.get(1)?;
            Ok(MatchmakingTicket {
                user_id: row.get(0)?,
                criteria: serde_json::from_str(&criteria).unwrap_or_else(|_| open_criteria()),
                queued_at: row.get(2)?,
                heartbeat_at: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(CoreError::TransientStore)
}

/// Leave the pool. An outstanding open proposal is rejected; the other side
/// is notified and re-queued at the back.
pub fn cancel(conn: &Connection, bus: &EventBus, user_id: &str) -> CoreResult<()> {
    conn.execute(
        "DELETE FROM matchmaking_tickets WHERE user_id = ?1",
        params![user_id],
    )
    .map_err(classify_sqlite)?;

    if let Some(p) = open_proposal_for(conn, user_id)? {
        set_proposal_status(conn, &p.id, ProposalStatus::Rejected)?;
        let other = p.other(user_id).to_string();
        requeue(conn, &other)?;
        bus.publish(ChatEvent::Requeued { to: other });
    }
    Ok(())
}

/// The open proposal targeting a user, if any. Clients poll this on
/// reconnect; the gateway pushes it at connect time.
pub fn open_proposal_for(conn: &Connection, user_id: &str) -> CoreResult<Option<MatchProposal>> {
    conn.query_row(
        "SELECT id, user_a, user_b, a_accepted, b_accepted, status, blind, created_at
         FROM match_proposals
         WHERE status = 'open' AND (user_a = ?1 OR user_b = ?1)
         ORDER BY created_at DESC LIMIT 1",
        params![user_id],
        proposal_from_row,
    )
    .optional()
    .map_err(CoreError::TransientStore)
}

pub fn get_proposal(conn: &Connection, proposal_id: &str) -> CoreResult<MatchProposal> {
    conn.query_row(
        "SELECT id, user_a, user_b, a_accepted, b_accepted, status, blind, created_at
         FROM match_proposals WHERE id = ?1",
        params![proposal_id],
        proposal_from_row,
    )
    .optional()
    .map_err(CoreError::TransientStore)?
    .ok_or(CoreError::NotFound("proposal"))
}

fn proposal_from_row(row: &rusqlite::Row) -> rusqlite::Result<MatchProposal> {
    let status: String = row.get(5)?;
    Ok(MatchProposal {
        id: row.get(0)?,
        user_a: row.get(1)?,
        user_b: row.get(2)?,
        a_accepted: row.get(3)?,
        b_accepted: row.get(4)?,
        status: ProposalStatus::parse(&status),
        blind: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Accept a proposal. When both sides have accepted, the pair is finalized:
/// chat ensured, friendship (or blind-date match) created, tickets removed,
/// `matched` emitted to both. Returns the chat id once finalized; accepting
/// an already-accepted proposal is a no-op returning the same chat id.
pub fn accept_proposal(
    conn: &Connection,
    bus: &EventBus,
    user_id: &str,
    proposal_id: &str,
) -> CoreResult<Option<String>> {
    let p = get_proposal(conn, proposal_id)?;
    if !p.involves(user_id) {
        return Err(CoreError::Forbidden("not part of this proposal"));
    }
    match p.status {
        ProposalStatus::Accepted => {
            let chat = chat::ensure_direct_chat(conn, &p.user_a, &p.user_b)?;
            return Ok(Some(chat.id));
        }
        ProposalStatus::Rejected | ProposalStatus::Expired => return Err(CoreError::Expired),
        ProposalStatus::Open => {}
    }
    if p.created_at + PROPOSAL_WINDOW_SECS <= now_epoch() {
        set_proposal_status(conn, &p.id, ProposalStatus::Expired)?;
        return Err(CoreError::Expired);
    }

    let column = if p.user_a == user_id { "a_accepted" } else { "b_accepted" };
    conn.execute(
        &format!("UPDATE match_proposals SET {column} = 1 WHERE id = ?1"),
        params![proposal_id],
    )
    .map_err(classify_sqlite)?;

    let p = get_proposal(conn, proposal_id)?;
    if p.a_accepted && p.b_accepted {
        let chat_id = finalize(conn, bus, &p)?;
        return Ok(Some(chat_id));
    }
    Ok(None)
}

/// Reject a proposal; both users rejoin the queue at the back.
pub fn reject_proposal(
    conn: &Connection,
    bus: &EventBus,
    user_id: &str,
    proposal_id: &str,
) -> CoreResult<()> {
    let p = get_proposal(conn, proposal_id)?;
    if !p.involves(user_id) {
        return Err(CoreError::Forbidden("not part of this proposal"));
    }
    if p.status != ProposalStatus::Open {
        return Err(CoreError::Expired);
    }
    set_proposal_status(conn, &p.id, ProposalStatus::Rejected)?;
    for user in [&p.user_a, &p.user_b] {
        requeue(conn, user)?;
        bus.publish(ChatEvent::Requeued { to: user.clone() });
    }
    Ok(())
}

fn set_proposal_status(conn: &Connection, id: &str, status: ProposalStatus) -> CoreResult<()> {
    conn.execute(
        "UPDATE match_proposals SET status = ?2 WHERE id = ?1",
        params![id, status.as_str()],
    )
    .map_err(classify_sqlite)?;
    Ok(())
}

/// Push an existing ticket to the back of the queue.
fn requeue(conn: &Connection, user_id: &str) -> CoreResult<()> {
    let now = now_epoch();
    conn.execute(
        "UPDATE matchmaking_tickets SET queued_at = ?2, heartbeat_at = ?2 WHERE user_id = ?1",
        params![user_id, now],
    )
    .map_err(classify_sqlite)?;
    Ok(())
}

fn finalize(conn: &Connection, bus: &EventBus, p: &MatchProposal) -> CoreResult<String> {
    let chat = chat::ensure_direct_chat(conn, &p.user_a, &p.user_b)?;
    if p.blind {
        blind_date::create_match(conn, &p.user_a, &p.user_b, &chat.id)?;
    } else {
        friends::upsert_accepted(conn, &p.user_a, &p.user_b)?;
    }
    conn.execute(
        "DELETE FROM matchmaking_tickets WHERE user_id IN (?1, ?2)",
        params![&p.user_a, &p.user_b],
    )
    .map_err(classify_sqlite)?;
    set_proposal_status(conn, &p.id, ProposalStatus::Accepted)?;

    for user in [&p.user_a, &p.user_b] {
        bus.publish(ChatEvent::Matched {
            to: user.clone(),
            other_user: p.other(user).to_string(),
            chat_id: chat.id.clone(),
            blind: p.blind,
        });
    }
    Ok(chat.id)
}

// --- The pass ---

#[derive(Debug, Default)]
pub struct PassOutcome {
    pub proposed: usize,
    pub expired_proposals: usize,
    pub dropped_tickets: usize,
}

struct Entrant {
    ticket: MatchmakingTicket,
    profile: Profile,
    /// criteria.interests ∪ profile interests ∪ profile needs
    interest_pool: Vec<String>,
}

impl Entrant {
    fn coords(&self) -> Option<(f64, f64)> {
        match (self.ticket.criteria.latitude, self.ticket.criteria.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => match (self.profile.latitude, self.profile.longitude) {
                (Some(lat), Some(lon)) => Some((lat, lon)),
                _ => None,
            },
        }
    }
}

/// One matchmaking pass. Runs under the matchmaking lease; each proposed
/// pair is additionally guarded by per-ticket soft-claims so a competing
/// pass (stale lease, slow worker) cannot double-propose a ticket.
pub fn run_pass(conn: &Connection, bus: &EventBus, holder: &str) -> CoreResult<PassOutcome> {
    let mut outcome = PassOutcome::default();
    let now = now_epoch();

    // Overdue open proposals expire first; both sides rejoin at the back.
    let overdue: Vec<MatchProposal> = {
        let mut stmt = conn
            .prepare(
                "SELECT id, user_a, user_b, a_accepted, b_accepted, status, blind, created_at
                 FROM match_proposals WHERE status = 'open' AND created_at + ?1 <= ?2",
            )
            .map_err(CoreError::TransientStore)?;
        stmt.query_map(params![PROPOSAL_WINDOW_SECS, now], proposal_from_row)
            .map_err(CoreError::TransientStore)?
            .filter_map(|r| r.ok())
            .collect()
    };
    for p in overdue {
        set_proposal_status(conn, &p.id, ProposalStatus::Expired)?;
        outcome.expired_proposals += 1;
        for user in [&p.user_a, &p.user_b] {
            requeue(conn, user)?;
            bus.publish(ChatEvent::ProposalExpired {
                to: user.clone(),
                proposal_id: p.id.clone(),
            });
            bus.publish(ChatEvent::Requeued { to: user.clone() });
        }
    }

    // Tickets that stopped heartbeating fall out, unless mid-proposal.
    outcome.dropped_tickets = conn
        .execute(
            "DELETE FROM matchmaking_tickets
             WHERE heartbeat_at + ?1 <= ?2
               AND user_id NOT IN (
                   SELECT user_a FROM match_proposals WHERE status = 'open'
                   UNION
                   SELECT user_b FROM match_proposals WHERE status = 'open')",
            params![TICKET_STALE_SECS, now],
        )
        .map_err(CoreError::TransientStore)?;

    // Snapshot, oldest first (fairness / anti-starvation).
    let entrants = load_entrants(conn)?;
    let busy: HashSet<String> = {
        let mut stmt = conn
            .prepare(
                "SELECT user_a FROM match_proposals WHERE status = 'open'
                 UNION SELECT user_b FROM match_proposals WHERE status = 'open'",
            )
            .map_err(CoreError::TransientStore)?;
        stmt.query_map([], |r| r.get(0))
            .map_err(CoreError::TransientStore)?
            .filter_map(|r| r.ok())
            .collect()
    };

    let mut paired: HashSet<String> = HashSet::new();
    for i in 0..entrants.len() {
        let t = &entrants[i];
        if paired.contains(&t.ticket.user_id) || busy.contains(&t.ticket.user_id) {
            continue;
        }

        let mut best: Option<(f64, usize)> = None;
        for (j, c) in entrants.iter().enumerate() {
            if j == i
                || paired.contains(&c.ticket.user_id)
                || busy.contains(&c.ticket.user_id)
                || !compatible(t, c)
                || !friends::mutual_visibility(conn, &t.ticket.user_id, &c.ticket.user_id)?
            {
                continue;
            }
            let score = score_candidate(t, c, now);
            let better = match best {
                None => true,
                Some((best_score, best_j)) => {
                    score > best_score
                        || (score == best_score
                            && c.ticket.queued_at < entrants[best_j].ticket.queued_at)
                }
            };
            if better {
                best = Some((score, j));
            }
        }

        let Some((_, j)) = best else { continue };
        let c = &entrants[j];

        // Soft-claim both tickets before committing the proposal.
        let t_key = format!("claim/{}", t.ticket.user_id);
        let c_key = format!("claim/{}", c.ticket.user_id);
        if !coordinator::try_claim(conn, &t_key, holder, coordinator::CLAIM_TTL_SECS)? {
            continue;
        }
        if !coordinator::try_claim(conn, &c_key, holder, coordinator::CLAIM_TTL_SECS)? {
            coordinator::release_claim(conn, &t_key, holder)?;
            continue;
        }

        let proposal = MatchProposal {
            id: uuid::Uuid::new_v4().to_string(),
            user_a: t.ticket.user_id.clone(),
            user_b: c.ticket.user_id.clone(),
            a_accepted: false,
            b_accepted: false,
            status: ProposalStatus::Open,
            blind: t.ticket.criteria.blind && c.ticket.criteria.blind,
            created_at: now,
        };
        conn.execute(
            "INSERT INTO match_proposals (id, user_a, user_b, a_accepted, b_accepted, status, blind, created_at)
             VALUES (?1, ?2, ?3, 0, 0, 'open', ?4, ?5)",
            params![&proposal.id, &proposal.user_a, &proposal.user_b, proposal.blind, now],
        )
        .map_err(classify_sqlite)?;

        paired.insert(t.ticket.user_id.clone());
        paired.insert(c.ticket.user_id.clone());
        outcome.proposed += 1;

        for user in [&proposal.user_a, &proposal.user_b] {
            bus.publish(ChatEvent::Proposal {
                to: user.clone(),
                proposal: proposal.clone(),
            });
        }
    }

    Ok(outcome)
}

fn load_entrants(conn: &Connection) -> CoreResult<Vec<Entrant>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.user_id, t.criteria, t.queued_at, t.heartbeat_at
             FROM matchmaking_tickets t
             JOIN profiles p ON p.id = t.user_id
             WHERE p.suspended = 0 AND p.deleted = 0 AND p.invisible = 0
             ORDER BY t.queued_at ASC, t.user_id ASC",
        )
        .map_err(CoreError::TransientStore)?;
    let tickets: Vec<MatchmakingTicket> = stmt
        .query_map([], |row| {
            let criteria: String = row.get(1)?;
            Ok(MatchmakingTicket {
                user_id: row.get(0)?,
                criteria: serde_json::from_str(&criteria).unwrap_or_else(|_| open_criteria()),
                queued_at: row.get(2)?,
                heartbeat_at: row.get(3)?,
            })
        })
        .map_err(CoreError::TransientStore)?
        .filter_map(|r| r.ok())
        .collect();

    let mut entrants = Vec::with_capacity(tickets.len());
    for ticket in tickets {
        let profile = conn
            .query_row(
                &format!(
                    "SELECT {} FROM profiles WHERE id = ?1",
                    crate::profiles::PROFILE_COLUMNS
                ),
                params![&ticket.user_id],
                profile_from_row,
            )
            .map_err(CoreError::TransientStore)?;
        let mut pool = ticket.criteria.interests.clone();
        pool.extend(profile.interests.iter().cloned());
        pool.extend(profile.needs.iter().cloned());
        pool.sort();
        pool.dedup();
        entrants.push(Entrant {
            ticket,
            profile,
            interest_pool: pool,
        });
    }
    Ok(entrants)
}

/// Hard filters: same pairing mode, gender filters both ways, age bands
/// overlap. A pair one side's gender filter rejects is never proposed.
fn compatible(t: &Entrant, c: &Entrant) -> bool {
    if t.ticket.criteria.blind != c.ticket.criteria.blind {
        return false;
    }
    if !gender_ok(&t.ticket.criteria, &c.profile) || !gender_ok(&c.ticket.criteria, &t.profile) {
        return false;
    }
    t.ticket.criteria.age_min <= c.ticket.criteria.age_max
        && c.ticket.criteria.age_min <= t.ticket.criteria.age_max
}

fn gender_ok(criteria: &MatchCriteria, profile: &Profile) -> bool {
    criteria.gender == "any" || criteria.gender == profile.gender
}

/// Reciprocity term: C's own age band takes T as-is.
fn reciprocal(t: &Entrant, c: &Entrant) -> bool {
    c.ticket.criteria.age_min <= t.profile.age && t.profile.age <= c.ticket.criteria.age_max
}

fn score_candidate(t: &Entrant, c: &Entrant, now: i64) -> f64 {
    let interests = scorer::jaccard(&t.interest_pool, &c.interest_pool);
    let radius = t.profile.preferences.location_preference.radius_km();
    let location = scorer::location_score(t.coords(), c.coords(), radius);
    let reciprocity = if reciprocal(t, c) { 1.0 } else { 0.5 };
    let age = (now - c.ticket.heartbeat_at).max(0) as f64;
    let freshness = (1.0 - age / TICKET_STALE_SECS as f64).max(0.0);

    interests * W_INTERESTS
        + location * W_LOCATION
        + reciprocity * W_RECIPROCITY
        + freshness * W_FRESHNESS
}
