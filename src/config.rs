use std::env;

/// Runtime configuration, read once at startup. Everything except
/// `JWT_SECRET` has a default; a missing secret aborts startup because a
/// gateway that cannot verify tokens would accept nobody and help nobody.
pub struct Config {
    /// SQLite path backing the Store and the coordinator kv table.
    pub database_path: String,
    /// HS256 signing secret for bearer tokens.
    pub jwt_secret: String,
    /// Mount point of the socket endpoint.
    pub ws_path: String,
    /// Exact origin allowed by CORS; `None` means the permissive default.
    pub cors_origin: Option<String>,
    /// External push collaborator endpoint; `None` means notifications are
    /// logged and dropped at the gate.
    pub push_webhook_url: Option<String>,
    /// Matchmaking pass cadence (seconds).
    pub match_interval_secs: u64,
    /// Prompt-matcher tick cadence (seconds).
    pub prompt_interval_secs: u64,
    /// Blind-date reminder sweep cadence (seconds).
    pub reminder_interval_secs: u64,
    /// Max `message` frames per user per minute.
    pub message_rate_max: usize,
}

impl Config {
    /// Read configuration from the environment. Panics when `JWT_SECRET` is
    /// unset — `fatal_config` is not recoverable.
    pub fn from_env() -> Self {
        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set: the gateway cannot authenticate sockets without it");
        Self::with_secret(jwt_secret)
    }

    /// Same as `from_env` but with the secret supplied directly (tests).
    pub fn with_secret(jwt_secret: String) -> Self {
        Config {
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "data/app.db".to_string()),
            jwt_secret,
            ws_path: env::var("WS_PATH").unwrap_or_else(|_| "/ws".to_string()),
            cors_origin: env::var("CORS_ORIGIN").ok(),
            push_webhook_url: env::var("PUSH_WEBHOOK_URL").ok(),
            match_interval_secs: env_u64("MATCH_INTERVAL_SECS", 5),
            prompt_interval_secs: env_u64("PROMPT_INTERVAL_SECS", 5),
            reminder_interval_secs: env_u64("REMINDER_INTERVAL_SECS", 6 * 3600),
            message_rate_max: env_u64("RATE_LIMIT_MESSAGES", 60) as usize,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
