use crate::models::{MatchProposal, Message, Reaction};
use tokio::sync::broadcast;

/// Everything that fans out beyond the socket that caused it. Room-scoped
/// variants carry `chat_id` (sockets filter on their joined set); variants
/// that must reach a member whether or not they are in the room also carry
/// the member list; user-directed variants carry `to`.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    NewMessage {
        message: Message,
        members: Vec<String>,
        sender_name: String,
    },
    MessageEdited {
        message: Message,
    },
    MessageDeleted {
        chat_id: String,
        message_id: String,
    },
    Typing {
        chat_id: String,
        members: Vec<String>,
        users: Vec<String>,
    },
    Delivered {
        chat_id: String,
        message_id: String,
        by: String,
    },
    Read {
        chat_id: String,
        members: Vec<String>,
        message_id: String,
        by: String,
    },
    ReactionAdded {
        reaction: Reaction,
        members: Vec<String>,
        sender_name: String,
    },
    ReactionRemoved {
        reaction: Reaction,
    },
    Presence {
        chat_id: String,
        online: bool,
    },

    // Matchmaking
    Proposal {
        to: String,
        proposal: MatchProposal,
    },
    ProposalExpired {
        to: String,
        proposal_id: String,
    },
    Requeued {
        to: String,
    },
    Matched {
        to: String,
        other_user: String,
        chat_id: String,
        blind: bool,
    },

    // Help requests
    RequestOffered {
        to: String,
        request_id: String,
        prompt: String,
    },
    HelpMatched {
        to: String,
        request_id: String,
        chat_id: String,
    },
    HelpStatus {
        to: String,
        request_id: String,
        status: String,
    },

    // Blind dates
    RevealRequested {
        to: String,
        match_id: String,
    },
    Revealed {
        to: String,
        match_id: String,
        chat_id: String,
    },
    BlindEnded {
        to: String,
        match_id: String,
    },
    BlindReminder {
        to: String,
        match_id: String,
    },

    // Friendships
    FriendRequest {
        to: String,
        from: String,
        sender_name: String,
    },
    FriendAccepted {
        to: String,
        from: String,
    },
}

#[derive(Clone)]
pub struct EventBus {
    pub sender: broadcast::Sender<ChatEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        EventBus { sender }
    }

    pub fn publish(&self, event: ChatEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.sender.subscribe()
    }
}
