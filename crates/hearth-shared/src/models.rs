//! Client-side domain models.
//!
//! These are the shapes the rest of the client works with. Wire DTOs in
//! [`crate::api`] convert into them at the REST/realtime boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Credential, LocalId, MessageId, NotificationId, PostId, UserId};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The authenticated user, owned by the session store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub credential: Credential,
}

// ---------------------------------------------------------------------------
// Peer
// ---------------------------------------------------------------------------

/// A friend eligible for chat. Snapshot refreshed per fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Peer {
    pub peer_id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    /// Appended locally, not yet echoed by the server.
    Pending,
    /// Server copy seen; `server_id` is set.
    Confirmed,
    /// No confirmation arrived within the confirmation window.
    Failed,
}

/// A single chat message inside a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub local_id: LocalId,
    pub server_id: Option<MessageId>,
    pub sender_id: UserId,
    /// The other side of the conversation, regardless of direction.
    pub peer_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub delivery: DeliveryState,
}

impl Message {
    pub fn is_confirmed(&self) -> bool {
        self.delivery == DeliveryState::Confirmed
    }
}

/// A server-originated message, normalised from the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub server_id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A feed entry. Only the counters change after fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub post_id: PostId,
    pub author_id: UserId,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub text: String,
    pub image_url: Option<String>,
    pub like_count: u32,
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
}

/// One page returned by the feed endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub has_more: bool,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    FriendRequest,
    FriendAccepted,
    Message,
    /// Anything the client does not model yet.
    Other(String),
}

impl NotificationKind {
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "like" => Self::Like,
            "comment" => Self::Comment,
            "friend_request" | "friendRequest" => Self::FriendRequest,
            "friend_accepted" | "friendAccepted" | "accept" => Self::FriendAccepted,
            "message" => Self::Message,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub actor_id: UserId,
    pub actor_name: String,
    pub actor_avatar: Option<String>,
    pub kind: NotificationKind,
    pub related_post_excerpt: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Friends / profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendRequest {
    pub request_id: String,
    pub from: Peer,
    pub status: RequestStatus,
}

/// Profile fields returned by `/user/me`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub user_id: UserId,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}
