use rocket::local::blocking::Client;
use rusqlite::Connection;

use kindred_server::config::Config;
use kindred_server::db;
use kindred_server::models::UpsertProfile;

pub const TEST_SECRET: &str = "test-secret";

fn temp_db_path() -> String {
    format!(
        "/tmp/kindred_test_{}.db",
        uuid::Uuid::new_v4().to_string().split('-').next().unwrap()
    )
}

fn remove_db(path: &str) {
    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(format!("{path}-wal"));
    let _ = std::fs::remove_file(format!("{path}-shm"));
}

pub fn test_config(db_path: &str) -> Config {
    Config {
        database_path: db_path.to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        ws_path: "/ws".to_string(),
        cors_origin: None,
        push_webhook_url: None,
        match_interval_secs: 5,
        prompt_interval_secs: 5,
        reminder_interval_secs: 21600,
        message_rate_max: 60,
    }
}

/// Wrapper around Client that auto-deletes the temp DB on drop.
/// Uses Option<Client> so we can drop the connection before the file.
pub struct TestClient {
    client: Option<Client>,
    db_path: String,
}

impl Drop for TestClient {
    fn drop(&mut self) {
        drop(self.client.take());
        remove_db(&self.db_path);
    }
}

impl std::ops::Deref for TestClient {
    type Target = Client;
    fn deref(&self) -> &Client {
        self.client.as_ref().unwrap()
    }
}

pub fn test_client() -> TestClient {
    let db_path = temp_db_path();
    let rocket = kindred_server::rocket_with_config(test_config(&db_path));
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient {
        client: Some(client),
        db_path,
    }
}

/// Direct store handle for engine-level tests: a migrated connection on a
/// unique temp DB, removed on drop.
pub struct TestStore {
    pub conn: Connection,
    db_path: String,
}

impl Drop for TestStore {
    fn drop(&mut self) {
        remove_db(&self.db_path);
    }
}

pub fn test_store() -> TestStore {
    let db_path = temp_db_path();
    let conn = Connection::open(&db_path).expect("open temp db");
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .unwrap();
    db::migrate(&conn);
    TestStore { conn, db_path }
}

/// Bearer token for a test user, valid for an hour.
pub fn token(user_id: &str) -> String {
    kindred_server::auth::sign_token(
        TEST_SECRET,
        user_id,
        chrono::Utc::now().timestamp() + 3600,
    )
}

/// Minimal profile body; tweak fields on the result as needed.
pub fn profile_body(username: &str, age: i64, gender: &str) -> UpsertProfile {
    serde_json::from_value(serde_json::json!({
        "username": username,
        "age": age,
        "gender": gender,
    }))
    .unwrap()
}

/// Insert an active profile directly through the library API.
pub fn create_user(conn: &Connection, id: &str, username: &str, age: i64, gender: &str) {
    kindred_server::profiles::upsert_profile(conn, id, &profile_body(username, age, gender))
        .expect("create profile");
}

/// Insert a profile with names and interests.
pub fn create_user_full(
    conn: &Connection,
    id: &str,
    username: &str,
    age: i64,
    gender: &str,
    interests: &[&str],
) {
    let body: UpsertProfile = serde_json::from_value(serde_json::json!({
        "username": username,
        "first_name": username,
        "last_name": "Tester",
        "age": age,
        "gender": gender,
        "interests": interests,
    }))
    .unwrap();
    kindred_server::profiles::upsert_profile(conn, id, &body).expect("create profile");
}
