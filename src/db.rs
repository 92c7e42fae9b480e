use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

pub struct Db {
    pub conn: Mutex<Connection>,
}

impl Db {
    pub fn new(path: &str) -> Self {
        let conn = Connection::open(path).expect("Failed to open database");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .expect("Failed to set pragmas");
        let db = Db {
            conn: Mutex::new(conn),
        };
        db.migrate();
        db
    }

    /// Lock the connection, recovering from a poisoned mutex — a panicked
    /// handler must not take the whole store down with it.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) {
        let conn = self.conn();
        migrate(&conn);
    }
}

/// Idempotent schema creation. Workers open their own connections from the
/// same path, so this runs once from `Db::new` and is a no-op afterwards.
pub fn migrate(conn: &Connection) {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            first_name TEXT,
            last_name TEXT,
            email TEXT,
            age INTEGER NOT NULL DEFAULT 0,
            gender TEXT NOT NULL DEFAULT '',
            latitude REAL,
            longitude REAL,
            location_updated_at TEXT,
            interests TEXT NOT NULL DEFAULT '[]',
            needs TEXT NOT NULL DEFAULT '[]',
            about TEXT NOT NULL DEFAULT '',
            location_preference TEXT NOT NULL DEFAULT 'anywhere',
            age_preference TEXT NOT NULL DEFAULT 'flexible',
            friendship_location_priority INTEGER NOT NULL DEFAULT 0,
            relationship_distance_flexible INTEGER NOT NULL DEFAULT 1,
            invisible INTEGER NOT NULL DEFAULT 0,
            suspended INTEGER NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS friendships (
            user1 TEXT NOT NULL,
            user2 TEXT NOT NULL,
            sender TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (user1, user2),
            CHECK (user1 < user2)
        );

        CREATE TABLE IF NOT EXISTS blocks (
            blocker TEXT NOT NULL,
            blocked TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (blocker, blocked)
        );

        CREATE TABLE IF NOT EXISTS chats (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            last_message_at TEXT
        );

        CREATE TABLE IF NOT EXISTS chat_members (
            chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            PRIMARY KEY (chat_id, user_id)
        );
        CREATE INDEX IF NOT EXISTS idx_chat_members_user ON chat_members(user_id);

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            sender TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            is_edited INTEGER NOT NULL DEFAULT 0,
            is_deleted INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_messages_chat_created ON messages(chat_id, created_at);

        CREATE TABLE IF NOT EXISTS receipts (
            message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (message_id, user_id, status)
        );

        CREATE TABLE IF NOT EXISTS reactions (
            message_id TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            emoji TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (message_id, user_id, emoji)
        );

        CREATE TABLE IF NOT EXISTS chat_deletions (
            chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            deleted_at TEXT NOT NULL,
            PRIMARY KEY (chat_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS mute_settings (
            user_id TEXT NOT NULL,
            chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            is_muted INTEGER NOT NULL DEFAULT 0,
            muted_until TEXT,
            PRIMARY KEY (user_id, chat_id)
        );

        CREATE TABLE IF NOT EXISTS matchmaking_tickets (
            user_id TEXT PRIMARY KEY,
            criteria TEXT NOT NULL,
            queued_at INTEGER NOT NULL,
            heartbeat_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tickets_queued ON matchmaking_tickets(queued_at);

        CREATE TABLE IF NOT EXISTS match_proposals (
            id TEXT PRIMARY KEY,
            user_a TEXT NOT NULL,
            user_b TEXT NOT NULL,
            a_accepted INTEGER NOT NULL DEFAULT 0,
            b_accepted INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'open',
            blind INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_proposals_status ON match_proposals(status);

        CREATE TABLE IF NOT EXISTS giver_profiles (
            user_id TEXT PRIMARY KEY,
            skills TEXT NOT NULL DEFAULT '[]',
            categories TEXT NOT NULL DEFAULT '[]',
            embedding TEXT NOT NULL DEFAULT '[]',
            total_helps INTEGER NOT NULL DEFAULT 0,
            average_rating REAL NOT NULL DEFAULT 0,
            available INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS help_requests (
            id TEXT PRIMARY KEY,
            receiver TEXT NOT NULL,
            prompt TEXT NOT NULL,
            embedding TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'searching',
            attempts INTEGER NOT NULL DEFAULT 0,
            declined TEXT NOT NULL DEFAULT '[]',
            matched_giver TEXT,
            chat_id TEXT,
            created_at TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_help_requests_status ON help_requests(status);

        CREATE TABLE IF NOT EXISTS giver_attempts (
            request_id TEXT NOT NULL REFERENCES help_requests(id) ON DELETE CASCADE,
            giver TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            sent_at INTEGER NOT NULL,
            responded_at INTEGER,
            PRIMARY KEY (request_id, giver)
        );
        CREATE INDEX IF NOT EXISTS idx_attempts_giver_status ON giver_attempts(giver, status);

        CREATE TABLE IF NOT EXISTS blind_date_matches (
            id TEXT PRIMARY KEY,
            user_a TEXT NOT NULL,
            user_b TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            message_count INTEGER NOT NULL DEFAULT 0,
            reveal_threshold INTEGER NOT NULL DEFAULT 20,
            user_a_revealed INTEGER NOT NULL DEFAULT 0,
            user_b_revealed INTEGER NOT NULL DEFAULT 0,
            chat_id TEXT NOT NULL,
            matched_at TEXT NOT NULL,
            reminder_sent_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_blind_chat ON blind_date_matches(chat_id);

        CREATE TABLE IF NOT EXISTS coordinator_kv (
            key TEXT PRIMARY KEY,
            holder TEXT NOT NULL DEFAULT '',
            value INTEGER NOT NULL DEFAULT 0,
            expires_at INTEGER NOT NULL
        );",
    )
    .expect("Failed to run migrations");
}

/// Current time as RFC 3339, the store's timestamp format.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Current time as epoch seconds, the format of TTL and deadline columns.
pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Encode a string set for a JSON text column.
pub fn encode_strings(v: &[String]) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a string set from a JSON text column.
pub fn decode_strings(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

/// Encode an embedding for a JSON text column.
pub fn encode_embedding(v: &[f32]) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string())
}

/// Decode an embedding from a JSON text column.
pub fn decode_embedding(s: &str) -> Vec<f32> {
    serde_json::from_str(s).unwrap_or_default()
}
