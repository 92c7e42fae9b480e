//! Lease, worker-registry, and counter primitives over the shared
//! `coordinator_kv` table. Every mutation is a single atomic statement so
//! concurrent workers collide deterministically: the loser sees zero rows
//! changed and backs off.

use rusqlite::{Connection, params};

use crate::db::now_epoch;
use crate::error::{CoreError, CoreResult};

/// Lease on the matchmaking pass.
pub const MATCHMAKING_LEASE: &str = "lease/matchmaking";
/// Lease on the prompt-matcher loop.
pub const PROMPT_LEASE: &str = "lease/prompt";
/// Lease on the blind-date reminder sweep.
pub const REMINDER_LEASE: &str = "lease/reminder";

/// Worker heartbeat cadence (seconds).
pub const HEARTBEAT_SECS: u64 = 5;
/// Registry entry TTL; a worker that misses three heartbeats falls out.
pub const WORKER_TTL_SECS: i64 = 15;
/// Soft-claim TTL on individual tickets; must not outlive the pass lease.
pub const CLAIM_TTL_SECS: i64 = 15;

/// Stable identity for this process's workers: `host:pid:nonce`.
pub fn worker_identity(name: &str) -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    let nonce = uuid::Uuid::new_v4().to_string();
    let nonce = nonce.split('-').next().unwrap_or("0");
    format!("{name}@{host}:{}:{nonce}", std::process::id())
}

/// Take or refresh a lease. Returns true iff `holder` now holds `key`:
/// the key was free, expired, or already ours.
pub fn acquire(conn: &Connection, key: &str, holder: &str, ttl_secs: i64) -> CoreResult<bool> {
    let now = now_epoch();
    let changed = conn
        .execute(
            "INSERT INTO coordinator_kv (key, holder, value, expires_at) VALUES (?1, ?2, 0, ?3)
             ON CONFLICT(key) DO UPDATE SET holder = excluded.holder, expires_at = excluded.expires_at
             WHERE coordinator_kv.expires_at <= ?4 OR coordinator_kv.holder = excluded.holder",
            params![key, holder, now + ttl_secs, now],
        )
        .map_err(CoreError::TransientStore)?;
    Ok(changed > 0)
}

/// Release a lease, but only if still owned (compare-and-delete).
pub fn release(conn: &Connection, key: &str, holder: &str) -> CoreResult<bool> {
    let changed = conn
        .execute(
            "DELETE FROM coordinator_kv WHERE key = ?1 AND holder = ?2",
            params![key, holder],
        )
        .map_err(CoreError::TransientStore)?;
    Ok(changed > 0)
}

/// Set-if-absent soft-claim. Unlike `acquire`, a live claim by another
/// holder is never stolen; an expired one is.
pub fn try_claim(conn: &Connection, key: &str, holder: &str, ttl_secs: i64) -> CoreResult<bool> {
    let now = now_epoch();
    let changed = conn
        .execute(
            "INSERT INTO coordinator_kv (key, holder, value, expires_at) VALUES (?1, ?2, 0, ?3)
             ON CONFLICT(key) DO UPDATE SET holder = excluded.holder, expires_at = excluded.expires_at
             WHERE coordinator_kv.expires_at <= ?4",
            params![key, holder, now + ttl_secs, now],
        )
        .map_err(CoreError::TransientStore)?;
    Ok(changed > 0)
}

/// Drop a soft-claim (same compare-and-delete as a lease release).
pub fn release_claim(conn: &Connection, key: &str, holder: &str) -> CoreResult<bool> {
    release(conn, key, holder)
}

/// Register (or refresh) a worker heartbeat under `worker/{id}`.
pub fn register_worker(conn: &Connection, worker_id: &str) -> CoreResult<()> {
    let now = now_epoch();
    conn.execute(
        "INSERT INTO coordinator_kv (key, holder, value, expires_at) VALUES (?1, ?2, 0, ?3)
         ON CONFLICT(key) DO UPDATE SET expires_at = excluded.expires_at",
        params![format!("worker/{worker_id}"), worker_id, now + WORKER_TTL_SECS],
    )
    .map_err(CoreError::TransientStore)?;
    Ok(())
}

/// Workers whose registration has not yet expired.
pub fn live_workers(conn: &Connection) -> CoreResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT holder FROM coordinator_kv WHERE key LIKE 'worker/%' AND expires_at > ?1")
        .map_err(CoreError::TransientStore)?;
    let workers = stmt
        .query_map(params![now_epoch()], |row| row.get(0))
        .map_err(CoreError::TransientStore)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(workers)
}

/// Atomic increment with TTL. An expired counter restarts at 1. Returns the
/// post-increment value.
pub fn incr_counter(conn: &Connection, key: &str, ttl_secs: i64) -> CoreResult<i64> {
    let now = now_epoch();
    conn.execute(
        "INSERT INTO coordinator_kv (key, holder, value, expires_at) VALUES (?1, '', 1, ?2)
         ON CONFLICT(key) DO UPDATE SET
             value = CASE WHEN coordinator_kv.expires_at <= ?3 THEN 1 ELSE coordinator_kv.value + 1 END,
             expires_at = excluded.expires_at",
        params![key, now + ttl_secs, now],
    )
    .map_err(CoreError::TransientStore)?;
    counter(conn, key)
}

/// Read a counter; expired or absent reads as 0.
pub fn counter(conn: &Connection, key: &str) -> CoreResult<i64> {
    let value = conn
        .query_row(
            "SELECT value FROM coordinator_kv WHERE key = ?1 AND expires_at > ?2",
            params![key, now_epoch()],
            |r| r.get(0),
        )
        .unwrap_or(0);
    Ok(value)
}
