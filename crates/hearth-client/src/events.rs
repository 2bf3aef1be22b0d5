use serde::Serialize;
use tokio::sync::broadcast;

use hearth_shared::types::{ConnectionStatus, LocalId, UserId};

pub const EVENT_CONVERSATION_UPDATED: &str = "conversation-updated";
pub const EVENT_MESSAGE_FAILED: &str = "message-failed";
pub const EVENT_CONNECTION_STATUS_CHANGED: &str = "connection-status-changed";
pub const EVENT_FEED_UPDATED: &str = "feed-updated";
pub const EVENT_MY_POSTS_UPDATED: &str = "my-posts-updated";
pub const EVENT_NOTIFICATIONS_UPDATED: &str = "notifications-updated";
pub const EVENT_FRIENDS_UPDATED: &str = "friends-updated";
pub const EVENT_PROFILE_UPDATED: &str = "profile-updated";
pub const EVENT_ERROR: &str = "error";

/// State changes the presentation layer reacts to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiEvent {
    ConversationUpdated { peer_id: UserId },
    MessageFailed { peer_id: UserId, local_id: LocalId },
    ConnectionStatusChanged { status: ConnectionStatus },
    FeedUpdated { len: usize, has_more: bool },
    MyPostsUpdated { len: usize },
    NotificationsUpdated { unread: usize },
    FriendsUpdated,
    ProfileUpdated,
    /// A component-local failure, rendered inline.
    Error { context: &'static str, message: String },
}

impl UiEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConversationUpdated { .. } => EVENT_CONVERSATION_UPDATED,
            Self::MessageFailed { .. } => EVENT_MESSAGE_FAILED,
            Self::ConnectionStatusChanged { .. } => EVENT_CONNECTION_STATUS_CHANGED,
            Self::FeedUpdated { .. } => EVENT_FEED_UPDATED,
            Self::MyPostsUpdated { .. } => EVENT_MY_POSTS_UPDATED,
            Self::NotificationsUpdated { .. } => EVENT_NOTIFICATIONS_UPDATED,
            Self::FriendsUpdated => EVENT_FRIENDS_UPDATED,
            Self::ProfileUpdated => EVENT_PROFILE_UPDATED,
            Self::Error { .. } => EVENT_ERROR,
        }
    }
}

/// Fan-out of [`UiEvent`]s. Slow receivers lag rather than block emitters.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UiEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: UiEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            tracing::trace!(event = name, "No listeners for event");
        }
    }

    pub fn emit_error(&self, context: &'static str, error: &impl std::fmt::Display) {
        tracing::warn!(context, error = %error, "Operation failed");
        self.emit(UiEvent::Error {
            context,
            message: error.to_string(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
