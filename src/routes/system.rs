use rocket::serde::json::Json;
use rocket::{State, get};

use crate::coordinator;
use crate::db::Db;
use crate::presence::Presence;

#[get("/api/v1/health")]
pub fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "kindred-server",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[get("/api/v1/stats")]
pub fn stats(db: &State<Db>, presence: &State<Presence>) -> Json<serde_json::Value> {
    let conn = db.conn();
    let count = |sql: &str| -> i64 { conn.query_row(sql, [], |r| r.get(0)).unwrap_or(0) };

    let profiles = count("SELECT COUNT(*) FROM profiles WHERE deleted = 0");
    let chats = count("SELECT COUNT(*) FROM chats");
    let messages = count("SELECT COUNT(*) FROM messages");
    let tickets = count("SELECT COUNT(*) FROM matchmaking_tickets");
    let searching = count("SELECT COUNT(*) FROM help_requests WHERE status = 'searching'");
    let blind_active = count("SELECT COUNT(*) FROM blind_date_matches WHERE status = 'active'");
    let workers = coordinator::live_workers(&conn).unwrap_or_default();
    let errors: i64 = ["matchmaking", "prompt", "reminder"]
        .iter()
        .map(|w| coordinator::counter(&conn, &format!("errors/{w}")).unwrap_or(0))
        .sum();

    Json(serde_json::json!({
        "profiles": profiles,
        "chats": chats,
        "messages": messages,
        "matchmaking_tickets": tickets,
        "help_requests_searching": searching,
        "blind_dates_active": blind_active,
        "rooms_online": presence.room_count(),
        "workers": workers,
        "worker_errors_1h": errors,
    }))
}

#[rocket::catch(404)]
pub fn not_found() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Not found"}))
}

#[rocket::catch(401)]
pub fn unauthorized() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Missing or invalid token"}))
}
