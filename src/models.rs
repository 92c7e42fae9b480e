use serde::{Deserialize, Serialize};

// --- Profiles ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LocationPreference {
    Nearby,
    City,
    Country,
    Anywhere,
}

impl LocationPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationPreference::Nearby => "nearby",
            LocationPreference::City => "city",
            LocationPreference::Country => "country",
            LocationPreference::Anywhere => "anywhere",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "nearby" => LocationPreference::Nearby,
            "city" => LocationPreference::City,
            "country" => LocationPreference::Country,
            _ => LocationPreference::Anywhere,
        }
    }

    /// Search radius in kilometres for a location preference.
    pub fn radius_km(&self) -> f64 {
        match self {
            LocationPreference::Nearby => 25.0,
            LocationPreference::City => 100.0,
            LocationPreference::Country => 1000.0,
            LocationPreference::Anywhere => 20_000.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgePreference {
    Strict,
    Flexible,
}

impl AgePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgePreference::Strict => "strict",
            AgePreference::Flexible => "flexible",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "strict" => AgePreference::Strict,
            _ => AgePreference::Flexible,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Preferences {
    pub location_preference: LocationPreference,
    pub age_preference: AgePreference,
    pub friendship_location_priority: bool,
    pub relationship_distance_flexible: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            location_preference: LocationPreference::Anywhere,
            age_preference: AgePreference::Flexible,
            friendship_location_priority: false,
            relationship_distance_flexible: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Profile {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub age: i64,
    pub gender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_updated_at: Option<String>,
    pub interests: Vec<String>,
    pub needs: Vec<String>,
    pub about: String,
    pub preferences: Preferences,
    pub invisible: bool,
    pub suspended: bool,
    pub deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Profile {
    /// Display name for notification enrichment:
    /// `first last` ?? `username` ?? local part of email ?? "Someone".
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(f), Some(l)) if !f.is_empty() && !l.is_empty() => format!("{f} {l}"),
            _ => {
                if !self.username.is_empty() {
                    self.username.clone()
                } else if let Some(email) = &self.email
                    && let Some(local) = email.split('@').next()
                    && !local.is_empty()
                {
                    local.to_string()
                } else {
                    "Someone".to_string()
                }
            }
        }
    }
}

/// What a viewer is allowed to see of another profile. Callers never branch
/// on raw reveal flags; they ask for a resolution and render the variant.
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResolvedProfile {
    Anonymized {
        id: String,
        age: i64,
        about: String,
        interests: Vec<String>,
    },
    Revealed {
        id: String,
        display_name: String,
        username: String,
        age: i64,
        gender: String,
        about: String,
        interests: Vec<String>,
    },
}

/// Compact counterpart summary used by the inbox.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProfileSummary {
    pub id: String,
    pub display_name: String,
    pub username: String,
    pub age: i64,
    pub gender: String,
}

#[derive(Debug, Deserialize)]
pub struct UpsertProfile {
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub age: i64,
    pub gender: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub needs: Vec<String>,
    #[serde(default)]
    pub about: String,
    #[serde(default)]
    pub preferences: Option<Preferences>,
    #[serde(default)]
    pub invisible: bool,
}

// --- Friendships & blocks ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Blocked,
    Inactive,
}

impl FriendshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendshipStatus::Pending => "pending",
            FriendshipStatus::Accepted => "accepted",
            FriendshipStatus::Blocked => "blocked",
            FriendshipStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => FriendshipStatus::Pending,
            "accepted" => FriendshipStatus::Accepted,
            "blocked" => FriendshipStatus::Blocked,
            _ => FriendshipStatus::Inactive,
        }
    }
}

/// One row per unordered pair; `user1 < user2` always.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Friendship {
    pub user1: String,
    pub user2: String,
    pub sender: String,
    pub status: FriendshipStatus,
    pub created_at: String,
    pub updated_at: String,
}

// --- Chats & messages ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Chat {
    pub id: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<String>,
}

pub const DELETED_MESSAGE_TEXT: &str = "This message was deleted";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender: String,
    pub text: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub is_edited: bool,
    pub is_deleted: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Delivered,
    Read,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Delivered => "delivered",
            ReceiptStatus::Read => "read",
        }
    }
}

/// Sender-side display status for a message: the fold over all counterpart
/// receipts, read > delivered > sent.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Reaction {
    pub message_id: String,
    pub chat_id: String,
    pub user_id: String,
    pub emoji: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MuteSetting {
    pub user_id: String,
    pub chat_id: String,
    pub is_muted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted_until: Option<String>,
}

// --- Inbox ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InboxMessage {
    pub id: String,
    pub sender: String,
    pub text: String,
    pub created_at: String,
    /// Fold over receipts: read > delivered > sent. Display-side only.
    pub status: MessageStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InboxEntry {
    pub chat_id: String,
    pub other_user: ProfileSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<InboxMessage>,
    pub unread_count: i64,
    pub muted: bool,
}

// --- Matchmaking ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchCriteria {
    /// Desired gender, or "any".
    #[serde(default = "default_any")]
    pub gender: String,
    pub age_min: i64,
    pub age_max: i64,
    #[serde(default)]
    pub interests: Vec<String>,
    /// Optional location hint overriding the profile coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Opt in to anonymous blind-date pairing.
    #[serde(default)]
    pub blind: bool,
}

fn default_any() -> String {
    "any".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchmakingTicket {
    pub user_id: String,
    pub criteria: MatchCriteria,
    /// Epoch seconds; pass order and freshness both derive from these.
    pub queued_at: i64,
    pub heartbeat_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Open,
    Accepted,
    Rejected,
    Expired,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Open => "open",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "open" => ProposalStatus::Open,
            "accepted" => ProposalStatus::Accepted,
            "rejected" => ProposalStatus::Rejected,
            _ => ProposalStatus::Expired,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchProposal {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    pub a_accepted: bool,
    pub b_accepted: bool,
    pub status: ProposalStatus,
    pub blind: bool,
    /// Epoch seconds. The 30 s acceptance window counts from here.
    pub created_at: i64,
}

impl MatchProposal {
    pub fn other(&self, user_id: &str) -> &str {
        if self.user_a == user_id { &self.user_b } else { &self.user_a }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }
}

// --- Help requests ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GiverProfile {
    pub user_id: String,
    pub skills: Vec<String>,
    pub categories: Vec<String>,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
    pub total_helps: i64,
    pub average_rating: f64,
    pub available: bool,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct UpsertGiver {
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "default_true")]
    pub available: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HelpRequestStatus {
    Searching,
    Matched,
    DeclinedAll,
    Completed,
    Cancelled,
    Expired,
}

impl HelpRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HelpRequestStatus::Searching => "searching",
            HelpRequestStatus::Matched => "matched",
            HelpRequestStatus::DeclinedAll => "declined_all",
            HelpRequestStatus::Completed => "completed",
            HelpRequestStatus::Cancelled => "cancelled",
            HelpRequestStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "searching" => HelpRequestStatus::Searching,
            "matched" => HelpRequestStatus::Matched,
            "declined_all" => HelpRequestStatus::DeclinedAll,
            "completed" => HelpRequestStatus::Completed,
            "cancelled" => HelpRequestStatus::Cancelled,
            _ => HelpRequestStatus::Expired,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HelpRequest {
    pub id: String,
    pub receiver: String,
    pub prompt: String,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
    pub status: HelpRequestStatus,
    pub attempts: i64,
    pub declined: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_giver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub created_at: String,
    /// Epoch seconds; created_at + 1 h.
    pub expires_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Accepted => "accepted",
            AttemptStatus::Declined => "declined",
            AttemptStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => AttemptStatus::Pending,
            "accepted" => AttemptStatus::Accepted,
            "declined" => AttemptStatus::Declined,
            _ => AttemptStatus::Expired,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GiverAttempt {
    pub request_id: String,
    pub giver: String,
    pub status: AttemptStatus,
    /// Epoch seconds. The 60 s response window counts from here.
    pub sent_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<i64>,
}

// --- Blind dates ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlindDateStatus {
    Active,
    Revealed,
    Ended,
}

impl BlindDateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlindDateStatus::Active => "active",
            BlindDateStatus::Revealed => "revealed",
            BlindDateStatus::Ended => "ended",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "active" => BlindDateStatus::Active,
            "revealed" => BlindDateStatus::Revealed,
            _ => BlindDateStatus::Ended,
        }
    }
}

pub const DEFAULT_REVEAL_THRESHOLD: i64 = 20;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BlindDateMatch {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    pub status: BlindDateStatus,
    pub message_count: i64,
    pub reveal_threshold: i64,
    pub user_a_revealed: bool,
    pub user_b_revealed: bool,
    pub chat_id: String,
    pub matched_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_sent_at: Option<String>,
}

impl BlindDateMatch {
    pub fn involves(&self, user_id: &str) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    pub fn other(&self, user_id: &str) -> &str {
        if self.user_a == user_id { &self.user_b } else { &self.user_a }
    }

    pub fn reveal_available(&self) -> bool {
        self.message_count >= self.reveal_threshold
    }
}
