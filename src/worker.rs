//! Background worker plumbing. One abstraction covers the matchmaking pass,
//! the prompt-matcher tick, and the reminder sweep: register with the
//! coordinator, take the loop's lease, run one tick, repeat. Extra processes
//! running the same workers act as hot standbys — they heartbeat in the
//! registry and take over when the lease lapses.

use log::{debug, info, warn};
use rusqlite::Connection;
use tokio::sync::watch;

use crate::coordinator;
use crate::error::CoreResult;
use crate::events::EventBus;

/// A lease holder that fails this many consecutive transient ticks lets go
/// of the lease so a standby can try.
const MAX_ERROR_STREAK: u32 = 3;

/// Signals a running worker to stop after its current tick.
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    pub name: &'static str,
}

impl WorkerHandle {
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Spawn a lease-guarded loop. `tick` runs only while this worker holds
/// `lease_key`; its errors are logged and counted, never fatal. The worker
/// opens its own store connection from `db_path`.
pub fn spawn<F>(
    name: &'static str,
    lease_key: &'static str,
    interval_secs: u64,
    db_path: String,
    bus: EventBus,
    tick: F,
) -> WorkerHandle
where
    F: Fn(&Connection, &EventBus, &str) -> CoreResult<String> + Send + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let holder = coordinator::worker_identity(name);

    tokio::spawn(async move {
        let conn = match Connection::open(&db_path) {
            Ok(c) => c,
            Err(e) => {
                warn!("{name}: failed to open store, worker not starting: {e}");
                return;
            }
        };
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .ok();

        info!("{name}: worker {holder} starting");
        let lease_ttl = (interval_secs as i64 * 3).max(coordinator::WORKER_TTL_SECS);
        let mut error_streak: u32 = 0;

        loop {
            if coordinator::register_worker(&conn, &holder).is_err() {
                warn!("{name}: registry heartbeat failed");
            }

            match coordinator::acquire(&conn, lease_key, &holder, lease_ttl) {
                Ok(true) => match tick(&conn, &bus, &holder) {
                    Ok(summary) => {
                        error_streak = 0;
                        if !summary.is_empty() {
                            debug!("{name}: {summary}");
                        }
                    }
                    Err(e) => {
                        warn!("{name}: tick failed: {e}");
                        let _ = coordinator::incr_counter(
                            &conn,
                            &format!("errors/{name}"),
                            3600,
                        );
                        if e.is_transient() {
                            error_streak += 1;
                            if error_streak >= MAX_ERROR_STREAK {
                                warn!("{name}: {error_streak} consecutive failures, releasing lease");
                                let _ = coordinator::release(&conn, lease_key, &holder);
                                error_streak = 0;
                            }
                        }
                    }
                },
                Ok(false) => {
                    // Another worker holds the lease; stay registered as standby.
                }
                Err(e) => warn!("{name}: lease acquire failed: {e}"),
            }

            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(interval_secs)) => {}
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        let _ = coordinator::release(&conn, lease_key, &holder);
                        info!("{name}: worker {holder} stopped");
                        return;
                    }
                }
            }
        }
    });

    WorkerHandle {
        shutdown: shutdown_tx,
        name,
    }
}
