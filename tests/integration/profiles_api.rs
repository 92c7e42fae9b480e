use rocket::http::{ContentType, Header, Status};

use crate::common::{create_user, test_client, test_store, token};
use kindred_server::models::ResolvedProfile;
use kindred_server::profiles;

fn auth(user: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {}", token(user)))
}

#[test]
fn test_upsert_and_fetch_profile() {
    let client = test_client();

    let res = client
        .put("/api/v1/profiles")
        .header(ContentType::JSON)
        .header(auth("alice"))
        .body(r#"{"username": "alice", "age": 29, "gender": "f", "interests": ["music", "travel"]}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["age"], 29);

    // Another user sees the revealed variant (no blind date between them)
    let res = client
        .get("/api/v1/profiles/alice")
        .header(auth("bob"))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["kind"], "revealed");
    assert_eq!(body["username"], "alice");
}

#[test]
fn test_location_requires_names() {
    let client = test_client();
    let res = client
        .put("/api/v1/profiles")
        .header(ContentType::JSON)
        .header(auth("carol"))
        .body(r#"{"username": "carol", "age": 30, "gender": "f", "latitude": 40.7, "longitude": -74.0}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}

#[test]
fn test_suspended_profile_hidden() {
    let store = test_store();
    create_user(&store.conn, "dave", "dave", 31, "m");
    store
        .conn
        .execute("UPDATE profiles SET suspended = 1 WHERE id = 'dave'", [])
        .unwrap();

    assert!(profiles::resolve_profile(&store.conn, "erin", "dave").is_err());
}

#[test]
fn test_display_name_fallback_chain() {
    let store = test_store();
    create_user(&store.conn, "u1", "", 20, "m");
    store
        .conn
        .execute(
            "UPDATE profiles SET email = 'someone@example.com' WHERE id = 'u1'",
            [],
        )
        .unwrap();
    let p = profiles::get_profile(&store.conn, "u1").unwrap();
    assert_eq!(p.display_name(), "someone");

    store
        .conn
        .execute("UPDATE profiles SET email = NULL WHERE id = 'u1'", [])
        .unwrap();
    let p = profiles::get_profile(&store.conn, "u1").unwrap();
    assert_eq!(p.display_name(), "Someone");
}

#[test]
fn test_resolution_is_tagged_variant() {
    let store = test_store();
    create_user(&store.conn, "a", "a-name", 22, "f");
    let resolved = profiles::resolve_profile(&store.conn, "b-viewer", "a").unwrap();
    match resolved {
        ResolvedProfile::Revealed { username, .. } => assert_eq!(username, "a-name"),
        ResolvedProfile::Anonymized { .. } => panic!("no blind date exists, must be revealed"),
    }
}
