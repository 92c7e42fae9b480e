use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get};

use crate::auth::AuthedUser;
use crate::chat;
use crate::db::Db;
use crate::error::to_http;
use crate::models::InboxEntry;

/// The caller's inbox: every chat they belong to with last message, receipt
/// fold, unread count, counterpart summary, and mute flag.
#[get("/api/v1/inbox")]
pub fn get_inbox(
    db: &State<Db>,
    user: AuthedUser,
) -> Result<Json<Vec<InboxEntry>>, (Status, Json<serde_json::Value>)> {
    let conn = db.conn();
    chat::inbox(&conn, &user.0).map(Json).map_err(|e| to_http(&e))
}
