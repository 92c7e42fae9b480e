//! Notification gate: the last stop before the external push collaborator.
//! Every candidate notification is checked against blocks, suspension, and
//! mute settings, then enriched with the sender's display name. Nothing in
//! here can fail a message send — enrichment and delivery errors log and
//! drop.

use log::{debug, warn};
use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::chat;
use crate::db::now_rfc3339;
use crate::events::ChatEvent;
use crate::friends;
use crate::profiles;

/// One gated, enriched notification ready for the push collaborator.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    pub event: &'static str,
    pub recipient: String,
    pub sender_name: String,
    pub data: serde_json::Value,
}

/// Subscribe to the event bus and hand gated notifications to the push
/// collaborator. Runs on a dedicated store connection with fire-and-forget
/// deliveries.
pub fn spawn_dispatcher(
    mut receiver: broadcast::Receiver<ChatEvent>,
    db_path: String,
    push_url: Option<String>,
) {
    tokio::spawn(async move {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        let conn = match Connection::open(&db_path) {
            Ok(c) => c,
            Err(e) => {
                warn!("notification gate: failed to open store: {e}");
                return;
            }
        };
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .ok();

        loop {
            match receiver.recv().await {
                Ok(event) => {
                    for notification in gate_event(&conn, &event) {
                        deliver(&client, push_url.as_deref(), notification);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("notification gate lagged, missed {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Apply the gate to one bus event, producing zero or more notifications.
/// Checks, in order: no block in either direction, recipient not suspended
/// or tombstoned, recipient has not muted the relevant chat.
pub fn gate_event(conn: &Connection, event: &ChatEvent) -> Vec<Notification> {
    let mut out = Vec::new();
    match event {
        ChatEvent::NewMessage {
            message,
            members,
            sender_name,
        } => {
            for recipient in members.iter().filter(|m| *m != &message.sender) {
                if !passes(conn, recipient, &message.sender, Some(&message.chat_id)) {
                    continue;
                }
                out.push(Notification {
                    event: "message",
                    recipient: recipient.clone(),
                    sender_name: sender_name.clone(),
                    data: serde_json::json!({
                        "chat_id": message.chat_id,
                        "message_id": message.id,
                        "text": message.text,
                    }),
                });
            }
        }
        ChatEvent::ReactionAdded {
            reaction,
            members,
            sender_name,
        } => {
            for recipient in members.iter().filter(|m| *m != &reaction.user_id) {
                if !passes(conn, recipient, &reaction.user_id, Some(&reaction.chat_id)) {
                    continue;
                }
                out.push(Notification {
                    event: "reaction",
                    recipient: recipient.clone(),
                    sender_name: sender_name.clone(),
                    data: serde_json::json!({
                        "chat_id": reaction.chat_id,
                        "message_id": reaction.message_id,
                        "emoji": reaction.emoji,
                    }),
                });
            }
        }
        ChatEvent::Matched {
            to,
            other_user,
            chat_id,
            blind,
        } => {
            if passes(conn, to, other_user, None) {
                out.push(Notification {
                    event: "matched",
                    recipient: to.clone(),
                    sender_name: display_name(conn, other_user),
                    data: serde_json::json!({"chat_id": chat_id, "blind": blind}),
                });
            }
        }
        ChatEvent::HelpMatched {
            to,
            request_id,
            chat_id,
        } => {
            out.push(Notification {
                event: "help_matched",
                recipient: to.clone(),
                sender_name: "Someone".to_string(),
                data: serde_json::json!({"request_id": request_id, "chat_id": chat_id}),
            });
        }
        ChatEvent::FriendRequest {
            to,
            from,
            sender_name,
        } => {
            if passes(conn, to, from, None) {
                out.push(Notification {
                    event: "friend_request",
                    recipient: to.clone(),
                    sender_name: sender_name.clone(),
                    data: serde_json::json!({"from": from}),
                });
            }
        }
        ChatEvent::FriendAccepted { to, from } => {
            if passes(conn, to, from, None) {
                out.push(Notification {
                    event: "friend_accepted",
                    recipient: to.clone(),
                    sender_name: display_name(conn, from),
                    data: serde_json::json!({"from": from}),
                });
            }
        }
        ChatEvent::BlindReminder { to, match_id } => {
            out.push(Notification {
                event: "blind_reminder",
                recipient: to.clone(),
                sender_name: "Someone".to_string(),
                data: serde_json::json!({"match_id": match_id}),
            });
        }
        // Everything else is socket-only fan-out.
        _ => {}
    }
    out
}

/// The gate proper. Any store failure along the way drops the notification
/// rather than blocking anything upstream.
fn passes(conn: &Connection, recipient: &str, sender: &str, chat_id: Option<&str>) -> bool {
    match friends::is_blocked_pair(conn, recipient, sender) {
        Ok(false) => {}
        Ok(true) => return false,
        Err(e) => {
            debug!("notification gate: block lookup failed: {e}");
            return false;
        }
    }
    match profiles::get_active_profile(conn, recipient) {
        Ok(_) => {}
        Err(_) => return false,
    }
    if let Some(chat_id) = chat_id {
        match chat::is_muted(conn, recipient, chat_id) {
            Ok(false) => {}
            Ok(true) => return false,
            Err(e) => {
                debug!("notification gate: mute lookup failed: {e}");
                return false;
            }
        }
    }
    true
}

fn display_name(conn: &Connection, user_id: &str) -> String {
    profiles::get_profile(conn, user_id)
        .map(|p| p.display_name())
        .unwrap_or_else(|_| "Someone".to_string())
}

/// Hand off to the push collaborator. No configured endpoint means the
/// notification is logged and dropped.
fn deliver(client: &reqwest::Client, push_url: Option<&str>, notification: Notification) {
    let Some(url) = push_url else {
        debug!(
            "notification gate: no push endpoint, dropping {} for {}",
            notification.event, notification.recipient
        );
        return;
    };

    let body = serde_json::json!({
        "event": notification.event,
        "recipient": notification.recipient,
        "sender_name": notification.sender_name,
        "data": notification.data,
        "timestamp": now_rfc3339(),
    });
    let request = client.post(url).json(&body);
    let event = notification.event;
    tokio::spawn(async move {
        if let Err(e) = request.send().await {
            warn!("push delivery failed for {event}: {e}");
        }
    });
}
