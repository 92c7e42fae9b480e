//! The socket gateway: one long-lived `/ws` connection per client, JSON
//! frames both ways. Inbound and outbound payloads are closed sum types —
//! an unknown frame kind is an error, not a guess. Fan-out rides the
//! broadcast bus; each connection filters events against its own user id
//! and joined rooms, so ordering within a chat is the bus's ordering for
//! every subscriber.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use rocket::State;
use rocket::futures::{SinkExt, StreamExt};
use rocket_ws as ws;
use serde::{Deserialize, Serialize};

use crate::auth::AuthedUser;
use crate::chat;
use crate::config::Config;
use crate::db::Db;
use crate::error::{CoreError, CoreResult};
use crate::events::{ChatEvent, EventBus};
use crate::models::{
    MatchCriteria, MatchProposal, Message, MuteSetting, Reaction, ReceiptStatus,
};
use crate::presence::Presence;
use crate::profiles;
use crate::rate_limit::RateLimiter;
use crate::{blind_date, friends, matchmaking, prompt};

/// Largest accepted inbound frame.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

// --- Wire types ---

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Join { chat_id: String },
    Leave { chat_id: String },
    Message { chat_id: String, text: String },
    Edit { message_id: String, text: String },
    Delete { chat_id: String, message_id: String },
    Typing { chat_id: String, typing: bool },
    Delivered { chat_id: String, message_id: String },
    Read { chat_id: String, message_id: String },
    ReactionToggle { chat_id: String, message_id: String, emoji: String },
    MuteSet { chat_id: String, muted: bool, until: Option<String> },
    ClearChat { chat_id: String },

    MatchmakingEnqueue { criteria: MatchCriteria },
    MatchmakingCancel,
    ProposalAccept { proposal_id: String },
    ProposalReject { proposal_id: String },

    HelpPublish { prompt: String },
    HelpRespond { request_id: String, accepted: bool },
    HelpCancel { request_id: String },
    HelpComplete { request_id: String },

    RevealRequest { match_id: String },
    BlindEnd { match_id: String },

    FriendRequest { to: String },
    FriendRespond { from: String, accept: bool },
    Block { user_id: String },
    Unblock { user_id: String },
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    History { chat_id: String, messages: Vec<Message> },
    Presence { chat_id: String, online: bool },
    Message { message: Message },
    MessageBackground { message: Message, sender_name: String },
    MessageEdited { message: Message },
    MessageDeleted { chat_id: String, message_id: String },
    Typing { chat_id: String, users: Vec<String> },
    Delivered { chat_id: String, message_id: String, by: String },
    Read { chat_id: String, message_id: String, by: String },
    ReactionAdded { reaction: Reaction, sender_name: String },
    ReactionRemoved { reaction: Reaction },
    MessageBlocked { chat_id: String, reason: String, detected_types: Vec<String> },
    MuteUpdated { mute: MuteSetting },
    Cleared { chat_id: String, deleted_at: String },

    Enqueued { queued_at: i64 },
    Proposal { proposal: MatchProposal },
    ProposalExpired { proposal_id: String },
    Requeued,
    Matched { chat_id: String, other_user: String, blind: bool },

    RequestPublished { request_id: String, expires_at: i64 },
    RequestOffered { request_id: String, prompt: String },
    HelpMatched { request_id: String, chat_id: String },
    HelpStatus { request_id: String, status: String },

    RevealRequested { match_id: String },
    Revealed { match_id: String, chat_id: String },
    BlindEnded { match_id: String },
    BlindReminder { match_id: String },

    FriendRequested { from: String, sender_name: String },
    FriendAccepted { from: String },

    Ack { of: &'static str },
    Error { code: &'static str, message: String },
}

fn err_frame(e: &CoreError) -> ServerFrame {
    ServerFrame::Error {
        code: e.code(),
        message: e.to_string(),
    }
}

// --- Connection state ---

struct Session {
    user_id: String,
    conn_id: u64,
    joined: HashSet<String>,
}

/// The socket endpoint, mounted at the configured `WS_PATH`. Token
/// verification happens in the `AuthedUser` guard before the upgrade; an
/// unauthenticated request never reaches the websocket handshake.
#[rocket::get("/")]
pub fn socket<'r>(
    ws: ws::WebSocket,
    user: AuthedUser,
    db: &'r State<Db>,
    bus: &'r State<EventBus>,
    presence: &'r State<Presence>,
    limiter: &'r State<RateLimiter>,
    config: &'r State<Config>,
) -> ws::Channel<'r> {
    let user_id = user.0;
    ws.channel(move |mut stream| {
        Box::pin(async move {
            let mut session = Session {
                user_id,
                conn_id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
                joined: HashSet::new(),
            };
            let mut rx = bus.subscribe();

            // Reconnect recovery: an open proposal is re-pushed immediately.
            let pending = {
                let conn = db.conn();
                matchmaking::open_proposal_for(&conn, &session.user_id)
            };
            if let Ok(Some(proposal)) = pending {
                send_frame(&mut stream, &ServerFrame::Proposal { proposal }).await?;
            }

            loop {
                tokio::select! {
                    incoming = stream.next() => {
                        let Some(message) = incoming else { break };
                        let message = match message {
                            Ok(m) => m,
                            Err(_) => break,
                        };
                        match message {
                            ws::Message::Text(text) => {
                                let replies = receive_text(&text, &mut session, db, bus, presence, limiter, config);
                                for frame in replies {
                                    send_frame(&mut stream, &frame).await?;
                                }
                            }
                            ws::Message::Close(_) => break,
                            // Pings are answered by the protocol layer.
                            _ => {}
                        }
                    }
                    event = rx.recv() => {
                        match event {
                            Ok(event) => {
                                if let Some(frame) = route_event(&event, &session) {
                                    send_frame(&mut stream, &frame).await?;
                                }
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                debug!("socket for {} lagged {n} events", session.user_id);
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }

            // Drop room membership and tell the rooms about it.
            for chat_id in session.joined.drain() {
                let count = presence.leave(&chat_id, session.conn_id);
                bus.publish(ChatEvent::Presence {
                    chat_id,
                    online: count > 1,
                });
            }
            Ok(())
        })
    })
}

async fn send_frame(
    stream: &mut ws::stream::DuplexStream,
    frame: &ServerFrame,
) -> ws::result::Result<()> {
    let json = serde_json::to_string(frame).unwrap_or_else(|_| {
        r#"{"type":"error","code":"internal","message":"serialization failed"}"#.to_string()
    });
    stream.send(ws::Message::Text(json)).await
}

/// Parse and dispatch one inbound text frame; returns the direct replies.
fn receive_text(
    text: &str,
    session: &mut Session,
    db: &Db,
    bus: &EventBus,
    presence: &Presence,
    limiter: &RateLimiter,
    config: &Config,
) -> Vec<ServerFrame> {
    if text.len() > MAX_FRAME_BYTES {
        return vec![ServerFrame::Error {
            code: "too_large",
            message: format!("frame exceeds {MAX_FRAME_BYTES} bytes"),
        }];
    }
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            return vec![ServerFrame::Error {
                code: "bad_frame",
                message: e.to_string(),
            }];
        }
    };
    handle_frame(frame, session, db, bus, presence, limiter, config)
}

fn handle_frame(
    frame: ClientFrame,
    session: &mut Session,
    db: &Db,
    bus: &EventBus,
    presence: &Presence,
    limiter: &RateLimiter,
    config: &Config,
) -> Vec<ServerFrame> {
    let user_id = session.user_id.clone();
    match frame {
        ClientFrame::Join { chat_id } => {
            let result: CoreResult<Vec<Message>> = (|| {
                let conn = db.conn();
                if !chat::is_member(&conn, &chat_id, &user_id)? {
                    return Err(CoreError::Forbidden("not a chat member"));
                }
                chat::history(&conn, &chat_id, &user_id)
            })();
            match result {
                Ok(messages) => {
                    let count = presence.join(&chat_id, session.conn_id);
                    session.joined.insert(chat_id.clone());
                    bus.publish(ChatEvent::Presence {
                        chat_id: chat_id.clone(),
                        online: count > 1,
                    });
                    vec![ServerFrame::History { chat_id, messages }]
                }
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::Leave { chat_id } => {
            if session.joined.remove(&chat_id) {
                let count = presence.leave(&chat_id, session.conn_id);
                bus.publish(ChatEvent::Presence {
                    chat_id,
                    online: count > 1,
                });
            }
            Vec::new()
        }

        ClientFrame::Message { chat_id, text } => {
            let info = limiter.check_with_info(
                &format!("message:{user_id}"),
                config.message_rate_max,
                60,
            );
            if !info.allowed {
                return vec![ServerFrame::Error {
                    code: "rate_limited",
                    message: format!("retry in {} s", info.retry_after_secs),
                }];
            }

            let result: CoreResult<(Message, Vec<String>, String)> = (|| {
                let conn = db.conn();
                let message = chat::send_message(&conn, &chat_id, &user_id, &text)?;
                let members = chat::members(&conn, &chat_id)?;
                let sender_name = profiles::get_profile(&conn, &user_id)
                    .map(|p| p.display_name())
                    .unwrap_or_else(|_| "Someone".to_string());
                Ok((message, members, sender_name))
            })();
            match result {
                Ok((message, members, sender_name)) => {
                    let echo = if session.joined.contains(&chat_id) {
                        Vec::new()
                    } else {
                        vec![ServerFrame::Message {
                            message: message.clone(),
                        }]
                    };
                    bus.publish(ChatEvent::NewMessage {
                        message,
                        members,
                        sender_name,
                    });
                    echo
                }
                Err(CoreError::Blocked) => vec![ServerFrame::MessageBlocked {
                    chat_id,
                    reason: "blocked".to_string(),
                    detected_types: Vec::new(),
                }],
                Err(CoreError::PiiDetected(types)) => vec![ServerFrame::MessageBlocked {
                    chat_id,
                    reason: "personal information detected".to_string(),
                    detected_types: types,
                }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::Edit { message_id, text } => {
            let result = {
                let conn = db.conn();
                chat::edit_message(&conn, &message_id, &user_id, &text)
            };
            match result {
                Ok(message) => {
                    bus.publish(ChatEvent::MessageEdited { message });
                    Vec::new()
                }
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::Delete { chat_id, message_id } => {
            let result = {
                let conn = db.conn();
                chat::delete_message(&conn, &chat_id, &message_id, &user_id)
            };
            match result {
                Ok(()) => {
                    bus.publish(ChatEvent::MessageDeleted { chat_id, message_id });
                    Vec::new()
                }
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::Typing { chat_id, typing } => {
            let members = {
                let conn = db.conn();
                chat::members(&conn, &chat_id)
            };
            let Ok(members) = members else { return Vec::new() };
            if !members.iter().any(|m| m == &user_id) {
                return vec![err_frame(&CoreError::Forbidden("not a chat member"))];
            }
            if let Some(users) = presence.typing_set(&chat_id, &user_id, typing) {
                bus.publish(ChatEvent::Typing {
                    chat_id,
                    members,
                    users,
                });
            }
            Vec::new()
        }

        ClientFrame::Delivered { chat_id, message_id } => {
            let result = {
                let conn = db.conn();
                chat::upsert_receipt(&conn, &message_id, &user_id, ReceiptStatus::Delivered)
            };
            match result {
                Ok(true) => {
                    bus.publish(ChatEvent::Delivered {
                        chat_id,
                        message_id,
                        by: user_id,
                    });
                    Vec::new()
                }
                Ok(false) => Vec::new(),
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::Read { chat_id, message_id } => {
            let result: CoreResult<(bool, Vec<String>)> = (|| {
                let conn = db.conn();
                let inserted =
                    chat::upsert_receipt(&conn, &message_id, &user_id, ReceiptStatus::Read)?;
                let members = chat::members(&conn, &chat_id)?;
                Ok((inserted, members))
            })();
            match result {
                Ok((true, members)) => {
                    bus.publish(ChatEvent::Read {
                        chat_id,
                        members,
                        message_id,
                        by: user_id,
                    });
                    Vec::new()
                }
                Ok((false, _)) => Vec::new(),
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::ReactionToggle {
            chat_id,
            message_id,
            emoji,
        } => {
            let result: CoreResult<(bool, Vec<String>, String)> = (|| {
                let conn = db.conn();
                if !chat::is_member(&conn, &chat_id, &user_id)? {
                    return Err(CoreError::Forbidden("not a chat member"));
                }
                let added = chat::toggle_reaction(&conn, &message_id, &user_id, &emoji)?;
                let members = chat::members(&conn, &chat_id)?;
                let sender_name = profiles::get_profile(&conn, &user_id)
                    .map(|p| p.display_name())
                    .unwrap_or_else(|_| "Someone".to_string());
                Ok((added, members, sender_name))
            })();
            match result {
                Ok((added, members, sender_name)) => {
                    let reaction = Reaction {
                        message_id,
                        chat_id,
                        user_id,
                        emoji,
                    };
                    if added {
                        bus.publish(ChatEvent::ReactionAdded {
                            reaction,
                            members,
                            sender_name,
                        });
                    } else {
                        bus.publish(ChatEvent::ReactionRemoved { reaction });
                    }
                    Vec::new()
                }
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::MuteSet { chat_id, muted, until } => {
            let result = {
                let conn = db.conn();
                chat::set_mute(&conn, &user_id, &chat_id, muted, until.as_deref())
            };
            match result {
                Ok(mute) => vec![ServerFrame::MuteUpdated { mute }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::ClearChat { chat_id } => {
            let result: CoreResult<String> = (|| {
                let conn = db.conn();
                if !chat::is_member(&conn, &chat_id, &user_id)? {
                    return Err(CoreError::Forbidden("not a chat member"));
                }
                chat::clear_chat(&conn, &chat_id, &user_id)
            })();
            match result {
                Ok(deleted_at) => vec![ServerFrame::Cleared { chat_id, deleted_at }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::MatchmakingEnqueue { criteria } => {
            let result = {
                let conn = db.conn();
                matchmaking::enqueue(&conn, &user_id, &criteria)
            };
            match result {
                Ok(ticket) => vec![ServerFrame::Enqueued {
                    queued_at: ticket.queued_at,
                }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::MatchmakingCancel => {
            let result = {
                let conn = db.conn();
                matchmaking::cancel(&conn, bus, &user_id)
            };
            match result {
                Ok(()) => vec![ServerFrame::Ack { of: "matchmaking_cancel" }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::ProposalAccept { proposal_id } => {
            let result = {
                let conn = db.conn();
                matchmaking::accept_proposal(&conn, bus, &user_id, &proposal_id)
            };
            match result {
                Ok(Some(_)) | Ok(None) => vec![ServerFrame::Ack { of: "proposal_accept" }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::ProposalReject { proposal_id } => {
            let result = {
                let conn = db.conn();
                matchmaking::reject_proposal(&conn, bus, &user_id, &proposal_id)
            };
            match result {
                Ok(()) => vec![ServerFrame::Ack { of: "proposal_reject" }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::HelpPublish { prompt: text } => {
            let result = {
                let conn = db.conn();
                prompt::publish_request(&conn, &user_id, &text)
            };
            match result {
                Ok(request) => vec![ServerFrame::RequestPublished {
                    request_id: request.id,
                    expires_at: request.expires_at,
                }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::HelpRespond { request_id, accepted } => {
            let result = {
                let conn = db.conn();
                prompt::respond(&conn, bus, &request_id, &user_id, accepted)
            };
            match result {
                Ok(_) => vec![ServerFrame::Ack { of: "help_respond" }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::HelpCancel { request_id } => {
            let result = {
                let conn = db.conn();
                prompt::cancel_request(&conn, &request_id, &user_id)
            };
            match result {
                Ok(()) => vec![ServerFrame::Ack { of: "help_cancel" }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::HelpComplete { request_id } => {
            let result = {
                let conn = db.conn();
                prompt::complete_request(&conn, &request_id, &user_id)
            };
            match result {
                Ok(()) => vec![ServerFrame::Ack { of: "help_complete" }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::RevealRequest { match_id } => {
            let result = {
                let conn = db.conn();
                blind_date::request_reveal(&conn, bus, &match_id, &user_id)
            };
            match result {
                Ok(_) => vec![ServerFrame::Ack { of: "reveal_request" }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::BlindEnd { match_id } => {
            let result = {
                let conn = db.conn();
                blind_date::end_match(&conn, bus, &match_id, &user_id)
            };
            match result {
                Ok(m) => vec![ServerFrame::BlindEnded { match_id: m.id }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::FriendRequest { to } => {
            let result: CoreResult<String> = (|| {
                let conn = db.conn();
                friends::send_request(&conn, &user_id, &to)?;
                Ok(profiles::get_profile(&conn, &user_id)
                    .map(|p| p.display_name())
                    .unwrap_or_else(|_| "Someone".to_string()))
            })();
            match result {
                Ok(sender_name) => {
                    bus.publish(ChatEvent::FriendRequest {
                        to,
                        from: user_id,
                        sender_name,
                    });
                    vec![ServerFrame::Ack { of: "friend_request" }]
                }
                // The row already says what the caller wanted it to say.
                Err(CoreError::Conflict) => vec![ServerFrame::Ack { of: "friend_request" }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::FriendRespond { from, accept } => {
            let result = {
                let conn = db.conn();
                friends::respond(&conn, &user_id, &from, accept)
            };
            match result {
                Ok(_) => {
                    if accept {
                        bus.publish(ChatEvent::FriendAccepted {
                            to: from,
                            from: user_id,
                        });
                    }
                    vec![ServerFrame::Ack { of: "friend_respond" }]
                }
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::Block { user_id: target } => {
            let result = {
                let conn = db.conn();
                friends::block(&conn, &user_id, &target)
            };
            match result {
                Ok(()) => vec![ServerFrame::Ack { of: "block" }],
                Err(e) => vec![err_frame(&e)],
            }
        }

        ClientFrame::Unblock { user_id: target } => {
            let result = {
                let conn = db.conn();
                friends::unblock(&conn, &user_id, &target)
            };
            match result {
                Ok(()) => vec![ServerFrame::Ack { of: "unblock" }],
                Err(e) => vec![err_frame(&e)],
            }
        }
    }
}

/// Decide whether a bus event reaches this connection, and as what frame.
fn route_event(event: &ChatEvent, session: &Session) -> Option<ServerFrame> {
    let me = &session.user_id;
    let in_room = |chat_id: &str| session.joined.contains(chat_id);

    match event {
        ChatEvent::NewMessage {
            message,
            members,
            sender_name,
        } => {
            if in_room(&message.chat_id) {
                Some(ServerFrame::Message {
                    message: message.clone(),
                })
            } else if members.iter().any(|m| m == me) && &message.sender != me {
                Some(ServerFrame::MessageBackground {
                    message: message.clone(),
                    sender_name: sender_name.clone(),
                })
            } else {
                None
            }
        }
        ChatEvent::MessageEdited { message } => in_room(&message.chat_id)
            .then(|| ServerFrame::MessageEdited {
                message: message.clone(),
            }),
        ChatEvent::MessageDeleted { chat_id, message_id } => {
            in_room(chat_id).then(|| ServerFrame::MessageDeleted {
                chat_id: chat_id.clone(),
                message_id: message_id.clone(),
            })
        }
        ChatEvent::Typing {
            chat_id,
            members,
            users,
        } => (in_room(chat_id) || members.iter().any(|m| m == me)).then(|| ServerFrame::Typing {
            chat_id: chat_id.clone(),
            users: users.clone(),
        }),
        ChatEvent::Delivered {
            chat_id,
            message_id,
            by,
        } => in_room(chat_id).then(|| ServerFrame::Delivered {
            chat_id: chat_id.clone(),
            message_id: message_id.clone(),
            by: by.clone(),
        }),
        ChatEvent::Read {
            chat_id,
            members,
            message_id,
            by,
        } => (in_room(chat_id) || members.iter().any(|m| m == me)).then(|| ServerFrame::Read {
            chat_id: chat_id.clone(),
            message_id: message_id.clone(),
            by: by.clone(),
        }),
        ChatEvent::ReactionAdded {
            reaction,
            members,
            sender_name,
        } => (in_room(&reaction.chat_id) || members.iter().any(|m| m == me)).then(|| {
            ServerFrame::ReactionAdded {
                reaction: reaction.clone(),
                sender_name: sender_name.clone(),
            }
        }),
        ChatEvent::ReactionRemoved { reaction } => {
            in_room(&reaction.chat_id).then(|| ServerFrame::ReactionRemoved {
                reaction: reaction.clone(),
            })
        }
        ChatEvent::Presence { chat_id, online } => {
            in_room(chat_id).then(|| ServerFrame::Presence {
                chat_id: chat_id.clone(),
                online: *online,
            })
        }

        ChatEvent::Proposal { to, proposal } => (to == me).then(|| ServerFrame::Proposal {
            proposal: proposal.clone(),
        }),
        ChatEvent::ProposalExpired { to, proposal_id } => {
            (to == me).then(|| ServerFrame::ProposalExpired {
                proposal_id: proposal_id.clone(),
            })
        }
        ChatEvent::Requeued { to } => (to == me).then(|| ServerFrame::Requeued),
        ChatEvent::Matched {
            to,
            other_user,
            chat_id,
            blind,
        } => (to == me).then(|| ServerFrame::Matched {
            chat_id: chat_id.clone(),
            other_user: other_user.clone(),
            blind: *blind,
        }),

        ChatEvent::RequestOffered {
            to,
            request_id,
            prompt,
        } => (to == me).then(|| ServerFrame::RequestOffered {
            request_id: request_id.clone(),
            prompt: prompt.clone(),
        }),
        ChatEvent::HelpMatched {
            to,
            request_id,
            chat_id,
        } => (to == me).then(|| ServerFrame::HelpMatched {
            request_id: request_id.clone(),
            chat_id: chat_id.clone(),
        }),
        ChatEvent::HelpStatus {
            to,
            request_id,
            status,
        } => (to == me).then(|| ServerFrame::HelpStatus {
            request_id: request_id.clone(),
            status: status.clone(),
        }),

        ChatEvent::RevealRequested { to, match_id } => {
            (to == me).then(|| ServerFrame::RevealRequested {
                match_id: match_id.clone(),
            })
        }
        ChatEvent::Revealed { to, match_id, chat_id } => (to == me).then(|| ServerFrame::Revealed {
            match_id: match_id.clone(),
            chat_id: chat_id.clone(),
        }),
        ChatEvent::BlindEnded { to, match_id } => (to == me).then(|| ServerFrame::BlindEnded {
            match_id: match_id.clone(),
        }),
        ChatEvent::BlindReminder { to, match_id } => {
            (to == me).then(|| ServerFrame::BlindReminder {
                match_id: match_id.clone(),
            })
        }

        ChatEvent::FriendRequest {
            to,
            from,
            sender_name,
        } => (to == me).then(|| ServerFrame::FriendRequested {
            from: from.clone(),
            sender_name: sender_name.clone(),
        }),
        ChatEvent::FriendAccepted { to, from } => {
            (to == me).then(|| ServerFrame::FriendAccepted { from: from.clone() })
        }
    }
}
