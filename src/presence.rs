//! In-memory room and typing state. Derived data only: membership comes from
//! live socket subscriptions, so a restart rebuilds everything as clients
//! reconnect and re-join.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a typing mark stays live without a refresh.
const TYPING_TTL: Duration = Duration::from_secs(5);
/// Minimum gap between rebroadcasts of the same user's typing state.
const TYPING_THROTTLE: Duration = Duration::from_secs(2);

#[derive(Default)]
pub struct Presence {
    /// chat id → connection ids currently joined.
    rooms: Mutex<HashMap<String, HashSet<u64>>>,
    /// chat id → user id → last typing mark.
    typing: Mutex<HashMap<String, HashMap<String, Instant>>>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to a room. Returns the online count after.
    pub fn join(&self, chat_id: &str, conn_id: u64) -> usize {
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        let room = rooms.entry(chat_id.to_string()).or_default();
        room.insert(conn_id);
        room.len()
    }

    /// Unsubscribe a connection. Returns the online count after; empty rooms
    /// are dropped from the map.
    pub fn leave(&self, chat_id: &str, conn_id: u64) -> usize {
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(room) = rooms.get_mut(chat_id) {
            room.remove(&conn_id);
            let n = room.len();
            if n == 0 {
                rooms.remove(chat_id);
            }
            n
        } else {
            0
        }
    }

    pub fn online_count(&self, chat_id: &str) -> usize {
        let rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        rooms.get(chat_id).map(HashSet::len).unwrap_or(0)
    }

    /// Total joined rooms, for /stats.
    pub fn room_count(&self) -> usize {
        let rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        rooms.len()
    }

    /// Mark a user typing (or not). Returns the room's live typing set when
    /// the update should be broadcast, `None` when it was throttled away or
    /// changed nothing.
    pub fn typing_set(&self, chat_id: &str, user_id: &str, typing: bool) -> Option<Vec<String>> {
        let mut map = self.typing.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let room = map.entry(chat_id.to_string()).or_default();

        let changed = if typing {
            match room.get(user_id) {
                Some(last) if now.duration_since(*last) < TYPING_THROTTLE => false,
                _ => {
                    room.insert(user_id.to_string(), now);
                    true
                }
            }
        } else {
            room.remove(user_id).is_some()
        };

        if !changed {
            return None;
        }

        let users = Self::live_typers(room, now);
        if room.is_empty() {
            map.remove(chat_id);
        }
        Some(users)
    }

    /// Current typing users in a room, expired marks pruned.
    pub fn typing_snapshot(&self, chat_id: &str) -> Vec<String> {
        let mut map = self.typing.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        match map.get_mut(chat_id) {
            Some(room) => Self::live_typers(room, now),
            None => Vec::new(),
        }
    }

    fn live_typers(room: &mut HashMap<String, Instant>, now: Instant) -> Vec<String> {
        room.retain(|_, at| now.duration_since(*at) < TYPING_TTL);
        let mut users: Vec<String> = room.keys().cloned().collect();
        users.sort();
        users
    }
}
