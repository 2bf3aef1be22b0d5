//! The REST boundary.
//!
//! Every component talks to the backend through [`Backend`] so the HTTP
//! implementation ([`crate::http::HttpBackend`]) can be swapped for a scripted
//! one in tests.

use async_trait::async_trait;

use hearth_shared::api::{ChangePasswordRequest, UpdateProfileRequest};
use hearth_shared::models::{
    FeedPage, FriendRequest, InboundMessage, Notification, Peer, Post, Profile, RequestStatus,
};
use hearth_shared::types::{NotificationId, PostId, UserId};

use crate::error::ClientError;

#[async_trait]
pub trait Backend: Send + Sync {
    // -- friends --

    /// Friends eligible for chat.
    async fn friends(&self) -> Result<Vec<Peer>, ClientError>;
    /// Every accepted friend, for the friends tab.
    async fn all_friends(&self) -> Result<Vec<Peer>, ClientError>;
    async fn friend_requests(&self) -> Result<Vec<FriendRequest>, ClientError>;
    async fn rejected_requests(&self) -> Result<Vec<FriendRequest>, ClientError>;
    async fn respond_friend_request(
        &self,
        request_id: &str,
        status: RequestStatus,
    ) -> Result<(), ClientError>;

    // -- messages --

    /// Most recent history with `peer`, oldest first.
    async fn messages(&self, peer: &UserId, limit: u32) -> Result<Vec<InboundMessage>, ClientError>;

    // -- posts --

    async fn feed(&self, page: u32, limit: u32) -> Result<FeedPage, ClientError>;
    /// The signed-in user's own posts, newest first.
    async fn my_posts(&self) -> Result<Vec<Post>, ClientError>;
    async fn create_post(&self, text: &str) -> Result<Post, ClientError>;
    async fn delete_post(&self, post: &PostId) -> Result<(), ClientError>;
    /// Toggle the caller's like; returns the confirmed like count.
    async fn like_post(&self, post: &PostId) -> Result<u32, ClientError>;
    /// Returns the confirmed comment count.
    async fn comment_post(&self, post: &PostId, text: &str) -> Result<u32, ClientError>;

    // -- notifications --

    async fn notifications(&self) -> Result<Vec<Notification>, ClientError>;
    async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), ClientError>;
    async fn mark_all_notifications_read(&self) -> Result<(), ClientError>;

    // -- profile --

    async fn me(&self) -> Result<Profile, ClientError>;
    /// Returns the stored profile when the backend echoes it.
    async fn update_profile(
        &self,
        request: &UpdateProfileRequest,
    ) -> Result<Option<Profile>, ClientError>;
    async fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), ClientError>;
}
