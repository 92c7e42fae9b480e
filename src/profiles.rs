//! Profile storage and the single profile-visibility capability. Callers
//! never look at reveal flags themselves: they ask `resolve_profile` and
//! render whichever variant comes back.

use rusqlite::{Connection, Row, params};

use crate::db::{decode_strings, encode_strings, now_rfc3339};
use crate::error::{CoreError, CoreResult, classify_sqlite};
use crate::models::{
    AgePreference, BlindDateStatus, LocationPreference, Preferences, Profile, ProfileSummary,
    ResolvedProfile, UpsertProfile,
};

pub const PROFILE_COLUMNS: &str = "id, username, first_name, last_name, email, age, gender, \
     latitude, longitude, location_updated_at, interests, needs, about, \
     location_preference, age_preference, friendship_location_priority, \
     relationship_distance_flexible, invisible, suspended, deleted, created_at, updated_at";

pub fn profile_from_row(row: &Row) -> rusqlite::Result<Profile> {
    let interests: String = row.get(10)?;
    let needs: String = row.get(11)?;
    let location_preference: String = row.get(13)?;
    let age_preference: String = row.get(14)?;
    Ok(Profile {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        age: row.get(5)?,
        gender: row.get(6)?,
        latitude: row.get(7)?,
        longitude: row.get(8)?,
        location_updated_at: row.get(9)?,
        interests: decode_strings(&interests),
        needs: decode_strings(&needs),
        about: row.get(12)?,
        preferences: Preferences {
            location_preference: LocationPreference::parse(&location_preference),
            age_preference: AgePreference::parse(&age_preference),
            friendship_location_priority: row.get(15)?,
            relationship_distance_flexible: row.get(16)?,
        },
        invisible: row.get(17)?,
        suspended: row.get(18)?,
        deleted: row.get(19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

pub fn get_profile(conn: &Connection, id: &str) -> CoreResult<Profile> {
    conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
        params![id],
        profile_from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => CoreError::NotFound("profile"),
        other => CoreError::TransientStore(other),
    })
}

/// A profile that is allowed to participate: present, not suspended, not
/// tombstoned.
pub fn get_active_profile(conn: &Connection, id: &str) -> CoreResult<Profile> {
    let profile = get_profile(conn, id)?;
    if profile.suspended || profile.deleted {
        return Err(CoreError::NotFound("profile"));
    }
    Ok(profile)
}

pub fn summary(conn: &Connection, id: &str) -> CoreResult<ProfileSummary> {
    let p = get_profile(conn, id)?;
    Ok(ProfileSummary {
        id: p.id.clone(),
        display_name: p.display_name(),
        username: p.username,
        age: p.age,
        gender: p.gender,
    })
}

/// Create or update a profile. A profile that carries coordinates must also
/// carry first and last name.
pub fn upsert_profile(conn: &Connection, id: &str, body: &UpsertProfile) -> CoreResult<Profile> {
    if (body.latitude.is_some() || body.longitude.is_some())
        && (none_or_empty(&body.first_name) || none_or_empty(&body.last_name))
    {
        return Err(CoreError::BadRequest(
            "a profile with location requires first and last name",
        ));
    }

    let now = now_rfc3339();
    let prefs = body.preferences.clone().unwrap_or_default();
    let location_updated_at = body.latitude.map(|_| now.clone());
    conn.execute(
        "INSERT INTO profiles (id, username, first_name, last_name, email, age, gender,
             latitude, longitude, location_updated_at, interests, needs, about,
             location_preference, age_preference, friendship_location_priority,
             relationship_distance_flexible, invisible, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?19)
         ON CONFLICT(id) DO UPDATE SET
             username = excluded.username, first_name = excluded.first_name,
             last_name = excluded.last_name, email = excluded.email,
             age = excluded.age, gender = excluded.gender,
             latitude = excluded.latitude, longitude = excluded.longitude,
             location_updated_at = excluded.location_updated_at,
             interests = excluded.interests, needs = excluded.needs,
             about = excluded.about,
             location_preference = excluded.location_preference,
             age_preference = excluded.age_preference,
             friendship_location_priority = excluded.friendship_location_priority,
             relationship_distance_flexible = excluded.relationship_distance_flexible,
             invisible = excluded.invisible, updated_at = excluded.updated_at",
        params![
            id,
            body.username,
            body.first_name,
            body.last_name,
            body.email,
            body.age,
            body.gender,
            body.latitude,
            body.longitude,
            location_updated_at,
            encode_strings(&body.interests),
            encode_strings(&body.needs),
            body.about,
            prefs.location_preference.as_str(),
            prefs.age_preference.as_str(),
            prefs.friendship_location_priority,
            prefs.relationship_distance_flexible,
            body.invisible,
            now,
        ],
    )
    .map_err(classify_sqlite)?;

    // Profile text feeds the giver embedding; regenerate if one exists.
    crate::prompt::refresh_giver_embedding(conn, id)?;

    get_profile(conn, id)
}

fn none_or_empty(v: &Option<String>) -> bool {
    v.as_deref().map(str::trim).unwrap_or("").is_empty()
}

/// Resolve what `viewer` may see of `target`. While an active blind-date
/// match connects the two, the target is anonymized; in every other context
/// (revealed, ended, or no blind relation) the full profile shows.
pub fn resolve_profile(
    conn: &Connection,
    viewer: &str,
    target: &str,
) -> CoreResult<ResolvedProfile> {
    let p = get_active_profile(conn, target)?;

    let anonymize = viewer != target && {
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM blind_date_matches
                 WHERE (user_a = ?1 AND user_b = ?2) OR (user_a = ?2 AND user_b = ?1)
                 ORDER BY matched_at DESC LIMIT 1",
                params![viewer, target],
                |r| r.get(0),
            )
            .ok();
        status.map(|s| BlindDateStatus::parse(&s)) == Some(BlindDateStatus::Active)
    };

    if anonymize {
        Ok(ResolvedProfile::Anonymized {
            id: p.id,
            age: p.age,
            about: p.about,
            interests: p.interests,
        })
    } else {
        Ok(ResolvedProfile::Revealed {
            display_name: p.display_name(),
            id: p.id,
            username: p.username,
            age: p.age,
            gender: p.gender,
            about: p.about,
            interests: p.interests,
        })
    }
}
