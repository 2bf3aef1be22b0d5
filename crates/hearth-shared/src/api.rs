//! REST wire format.
//!
//! Field names follow the backend's JSON (`_id`, camelCase). Everything here
//! converts into the types in [`crate::models`] before the rest of the client
//! sees it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::EXCERPT_CHARS;
use crate::models::{
    FeedPage, FriendRequest, InboundMessage, Notification, NotificationKind, Peer, Post, Profile,
    RequestStatus,
};
use crate::types::{MessageId, NotificationId, PostId, UserId};

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiUser {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_pic: Option<String>,
}

impl From<ApiUser> for Peer {
    fn from(u: ApiUser) -> Self {
        Self {
            peer_id: UserId(u.id),
            display_name: u.name.unwrap_or_default(),
            avatar_url: u.profile_pic.filter(|p| !p.is_empty()),
        }
    }
}

impl From<ApiUser> for Profile {
    fn from(u: ApiUser) -> Self {
        Self {
            user_id: UserId(u.id),
            display_name: u.name.unwrap_or_default(),
            email: u.email,
            avatar_url: u.profile_pic.filter(|p| !p.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FriendsResponse {
    #[serde(default)]
    pub friends: Vec<ApiUser>,
}

/// `/user/me` answers either `{ user: {...} }` or the bare user object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MeResponse {
    Wrapped { user: ApiUser },
    Bare(ApiUser),
}

impl MeResponse {
    pub fn into_user(self) -> ApiUser {
        match self {
            Self::Wrapped { user } => user,
            Self::Bare(user) => user,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// `/user/update` echoes the stored user only on some deployments.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfileResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<ApiUser>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

// ---------------------------------------------------------------------------
// Friend requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ApiFriendRequest {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(alias = "sender")]
    pub from: ApiUser,
    #[serde(default = "default_request_status")]
    pub status: RequestStatus,
}

fn default_request_status() -> RequestStatus {
    RequestStatus::Pending
}

impl From<ApiFriendRequest> for FriendRequest {
    fn from(r: ApiFriendRequest) -> Self {
        Self {
            request_id: r.id,
            from: r.from.into(),
            status: r.status,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestsResponse {
    #[serde(default)]
    pub friend_requests: Vec<ApiFriendRequest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRequestsResponse {
    #[serde(default)]
    pub rejected_requests: Vec<ApiFriendRequest>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRequest {
    pub request_id: String,
    pub status: RequestStatus,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiUserRef {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Message as returned by history backfill and pushed by `receive_message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    pub sender: ApiUserRef,
    pub receiver: ApiUserRef,
    pub created_at: DateTime<Utc>,
}

impl From<ApiMessage> for InboundMessage {
    fn from(m: ApiMessage) -> Self {
        Self {
            server_id: MessageId(m.id),
            sender_id: UserId(m.sender.id),
            receiver_id: UserId(m.receiver.id),
            content: m.content,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

/// Likes/comments come back either as the full array or as a bare count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Counter {
    Count(u32),
    List(Vec<serde_json::Value>),
}

impl Counter {
    pub fn count(&self) -> u32 {
        match self {
            Self::Count(n) => *n,
            Self::List(items) => items.len() as u32,
        }
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::Count(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiPost {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(alias = "author")]
    pub user: ApiUser,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub likes: Counter,
    #[serde(default)]
    pub comments: Counter,
    pub created_at: DateTime<Utc>,
}

impl From<ApiPost> for Post {
    fn from(p: ApiPost) -> Self {
        Self {
            post_id: PostId(p.id),
            author_id: UserId(p.user.id),
            author_name: p.user.name.unwrap_or_default(),
            author_avatar: p.user.profile_pic.filter(|a| !a.is_empty()),
            text: p.text,
            image_url: p.image.filter(|i| !i.is_empty()),
            like_count: p.likes.count(),
            comment_count: p.comments.count(),
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub posts: Vec<ApiPost>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl From<FeedResponse> for FeedPage {
    fn from(r: FeedResponse) -> Self {
        Self {
            posts: r.posts.into_iter().map(Post::from).collect(),
            has_more: r.pagination.has_more,
        }
    }
}

/// `/post/myposts`: the signed-in user's own posts, unpaginated.
#[derive(Debug, Clone, Deserialize)]
pub struct MyPostsResponse {
    #[serde(default)]
    pub posts: Vec<ApiPost>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostResponse {
    pub post: ApiPost,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LikeResponse {
    pub likes: Counter,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentResponse {
    pub comments: Counter,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPostExcerpt {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNotification {
    #[serde(rename = "_id")]
    pub id: String,
    pub sender: ApiUser,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub post: Option<ApiPostExcerpt>,
    #[serde(default, alias = "isRead")]
    pub is_checked: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ApiNotification> for Notification {
    fn from(n: ApiNotification) -> Self {
        Self {
            id: NotificationId(n.id),
            actor_id: UserId(n.sender.id),
            actor_name: n.sender.name.unwrap_or_default(),
            actor_avatar: n.sender.profile_pic.filter(|a| !a.is_empty()),
            kind: NotificationKind::from_wire(&n.kind),
            related_post_excerpt: n.post.map(|p| excerpt(&p.text)),
            is_read: n.is_checked,
            created_at: n.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsResponse {
    #[serde(default)]
    pub notifications: Vec<ApiNotification>,
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

fn excerpt(text: &str) -> String {
    let mut out: String = text.chars().take(EXCERPT_CHARS).collect();
    if text.chars().count() > EXCERPT_CHARS {
        out.push('…');
    }
    out
}
