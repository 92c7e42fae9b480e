use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get, put};

use crate::auth::AuthedUser;
use crate::db::Db;
use crate::error::to_http;
use crate::models::{GiverProfile, Profile, ResolvedProfile, UpsertGiver, UpsertProfile};
use crate::profiles;
use crate::prompt;

/// Profile resolution goes through the visibility capability: the caller
/// gets the anonymized or revealed variant and never sees raw flags.
#[get("/api/v1/profiles/<id>")]
pub fn get_profile(
    db: &State<Db>,
    user: AuthedUser,
    id: &str,
) -> Result<Json<ResolvedProfile>, (Status, Json<serde_json::Value>)> {
    let conn = db.conn();
    profiles::resolve_profile(&conn, &user.0, id)
        .map(Json)
        .map_err(|e| to_http(&e))
}

/// Upsert the caller's own profile. Changing profile text regenerates the
/// giver embedding.
#[put("/api/v1/profiles", format = "json", data = "<body>")]
pub fn upsert_profile(
    db: &State<Db>,
    user: AuthedUser,
    body: Json<UpsertProfile>,
) -> Result<Json<Profile>, (Status, Json<serde_json::Value>)> {
    let conn = db.conn();
    profiles::upsert_profile(&conn, &user.0, &body)
        .map(Json)
        .map_err(|e| to_http(&e))
}

/// Upsert the caller's giver availability and skills.
#[put("/api/v1/givers", format = "json", data = "<body>")]
pub fn upsert_giver(
    db: &State<Db>,
    user: AuthedUser,
    body: Json<UpsertGiver>,
) -> Result<Json<GiverProfile>, (Status, Json<serde_json::Value>)> {
    let conn = db.conn();
    profiles::get_active_profile(&conn, &user.0).map_err(|e| to_http(&e))?;
    prompt::upsert_giver(&conn, &user.0, &body)
        .map(Json)
        .map_err(|e| to_http(&e))
}
