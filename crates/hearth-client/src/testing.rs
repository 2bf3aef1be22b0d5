//! Scripted [`Backend`] shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use hearth_shared::api::{ChangePasswordRequest, UpdateProfileRequest};
use hearth_shared::models::{
    FeedPage, FriendRequest, InboundMessage, Notification, NotificationKind, Peer, Post, Profile,
    RequestStatus,
};
use hearth_shared::types::{MessageId, NotificationId, PostId, UserId};

use crate::backend::Backend;
use crate::error::ClientError;

#[derive(Default)]
pub(crate) struct MockBackend {
    pub histories: Mutex<HashMap<UserId, Vec<InboundMessage>>>,
    pub pages: Mutex<HashMap<u32, FeedPage>>,
    pub notifications: Mutex<Vec<Notification>>,
    pub friends: Mutex<Vec<Peer>>,
    pub all_friends: Mutex<Vec<Peer>>,
    pub my_posts: Mutex<Vec<Post>>,
    pub requests: Mutex<Vec<FriendRequest>>,
    pub profile: Mutex<Option<Profile>>,
    pub password: Mutex<Option<ChangePasswordRequest>>,
    counters: Mutex<HashMap<PostId, (u32, u32)>>,
    failing: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every call to `op` fail until [`MockBackend::succeed`].
    pub fn fail(&self, op: &str) {
        self.failing.lock().unwrap().insert(op.to_string());
    }

    pub fn succeed(&self, op: &str) {
        self.failing.lock().unwrap().remove(op);
    }

    /// Park calls with this key until [`MockBackend::release`].
    pub fn hold(&self, key: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(key.to_string(), Arc::new(Semaphore::new(0)));
    }

    /// Let one parked call through.
    pub fn release(&self, key: &str) {
        if let Some(gate) = self.gates.lock().unwrap().get(key) {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    async fn enter(&self, op: &str, key: &str) -> Result<(), ClientError> {
        *self.calls.lock().unwrap().entry(op.to_string()).or_default() += 1;

        let gate = self.gates.lock().unwrap().get(key).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        if self.failing.lock().unwrap().contains(op) {
            return Err(ClientError::Network(format!("{op}: scripted failure")));
        }
        Ok(())
    }
}

pub(crate) fn post(id: &str) -> Post {
    Post {
        post_id: PostId(id.into()),
        author_id: UserId::new("author"),
        author_name: "Author".into(),
        author_avatar: None,
        text: format!("post {id}"),
        image_url: None,
        like_count: 0,
        comment_count: 0,
        created_at: Utc::now(),
    }
}

pub(crate) fn page(ids: &[&str], has_more: bool) -> FeedPage {
    FeedPage {
        posts: ids.iter().map(|id| post(id)).collect(),
        has_more,
    }
}

pub(crate) fn notification(id: &str, is_read: bool) -> Notification {
    Notification {
        id: NotificationId(id.into()),
        actor_id: UserId::new("riya"),
        actor_name: "Riya".into(),
        actor_avatar: None,
        kind: NotificationKind::Like,
        related_post_excerpt: None,
        is_read,
        created_at: Utc::now(),
    }
}

pub(crate) fn inbound(id: &str, from: &str, to: &str, text: &str) -> InboundMessage {
    InboundMessage {
        server_id: MessageId(id.into()),
        sender_id: UserId::new(from),
        receiver_id: UserId::new(to),
        content: text.into(),
        created_at: Utc::now(),
    }
}

pub(crate) fn peer(id: &str) -> Peer {
    Peer {
        peer_id: UserId::new(id),
        display_name: id.to_uppercase(),
        avatar_url: None,
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn friends(&self) -> Result<Vec<Peer>, ClientError> {
        self.enter("friends", "friends").await?;
        Ok(self.friends.lock().unwrap().clone())
    }

    async fn all_friends(&self) -> Result<Vec<Peer>, ClientError> {
        self.enter("all_friends", "all_friends").await?;
        Ok(self.all_friends.lock().unwrap().clone())
    }

    async fn friend_requests(&self) -> Result<Vec<FriendRequest>, ClientError> {
        self.enter("friend_requests", "friend_requests").await?;
        Ok(self
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .cloned()
            .collect())
    }

    async fn rejected_requests(&self) -> Result<Vec<FriendRequest>, ClientError> {
        self.enter("rejected_requests", "rejected_requests").await?;
        Ok(self
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.status == RequestStatus::Rejected)
            .cloned()
            .collect())
    }

    async fn respond_friend_request(
        &self,
        request_id: &str,
        status: RequestStatus,
    ) -> Result<(), ClientError> {
        self.enter("respond_friend_request", request_id).await?;
        let mut requests = self.requests.lock().unwrap();
        let request = requests
            .iter_mut()
            .find(|r| r.request_id == request_id)
            .ok_or(ClientError::Http {
                status: 404,
                message: "request not found".into(),
            })?;
        request.status = status;
        if status == RequestStatus::Accepted {
            self.friends.lock().unwrap().push(request.from.clone());
            self.all_friends.lock().unwrap().push(request.from.clone());
        }
        Ok(())
    }

    async fn messages(&self, peer: &UserId, limit: u32) -> Result<Vec<InboundMessage>, ClientError> {
        self.enter("messages", &format!("messages:{peer}")).await?;
        let history = self
            .histories
            .lock()
            .unwrap()
            .get(peer)
            .cloned()
            .unwrap_or_default();
        let skip = history.len().saturating_sub(limit as usize);
        Ok(history.into_iter().skip(skip).collect())
    }

    async fn feed(&self, page: u32, _limit: u32) -> Result<FeedPage, ClientError> {
        self.enter("feed", &format!("feed:{page}")).await?;
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .unwrap_or(FeedPage {
                posts: Vec::new(),
                has_more: false,
            }))
    }

    async fn my_posts(&self) -> Result<Vec<Post>, ClientError> {
        self.enter("my_posts", "my_posts").await?;
        Ok(self.my_posts.lock().unwrap().clone())
    }

    async fn create_post(&self, text: &str) -> Result<Post, ClientError> {
        self.enter("create_post", "create_post").await?;
        let n = self.calls("create_post");
        let mut created = post(&format!("new-{n}"));
        created.text = text.to_string();
        self.my_posts.lock().unwrap().insert(0, created.clone());
        Ok(created)
    }

    async fn delete_post(&self, post: &PostId) -> Result<(), ClientError> {
        self.enter("delete_post", &post.0).await?;
        self.my_posts.lock().unwrap().retain(|p| p.post_id != *post);
        Ok(())
    }

    async fn like_post(&self, post: &PostId) -> Result<u32, ClientError> {
        self.enter("like_post", &post.0).await?;
        let mut counters = self.counters.lock().unwrap();
        let entry = counters.entry(post.clone()).or_default();
        entry.0 += 1;
        Ok(entry.0)
    }

    async fn comment_post(&self, post: &PostId, _text: &str) -> Result<u32, ClientError> {
        self.enter("comment_post", &post.0).await?;
        let mut counters = self.counters.lock().unwrap();
        let entry = counters.entry(post.clone()).or_default();
        entry.1 += 1;
        Ok(entry.1)
    }

    async fn notifications(&self) -> Result<Vec<Notification>, ClientError> {
        self.enter("notifications", "notifications").await?;
        Ok(self.notifications.lock().unwrap().clone())
    }

    async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), ClientError> {
        self.enter("mark_notification_read", &id.0).await?;
        for n in self.notifications.lock().unwrap().iter_mut() {
            if n.id == *id {
                n.is_read = true;
            }
        }
        Ok(())
    }

    async fn mark_all_notifications_read(&self) -> Result<(), ClientError> {
        self.enter("mark_all_notifications_read", "mark_all_notifications_read")
            .await?;
        for n in self.notifications.lock().unwrap().iter_mut() {
            n.is_read = true;
        }
        Ok(())
    }

    async fn me(&self) -> Result<Profile, ClientError> {
        self.enter("me", "me").await?;
        self.profile.lock().unwrap().clone().ok_or(ClientError::Http {
            status: 404,
            message: "user not found".into(),
        })
    }

    async fn update_profile(
        &self,
        request: &UpdateProfileRequest,
    ) -> Result<Option<Profile>, ClientError> {
        self.enter("update_profile", "update_profile").await?;
        let mut profile = self.profile.lock().unwrap();
        let Some(profile) = profile.as_mut() else {
            return Ok(None);
        };
        profile.display_name = request.name.clone();
        profile.email = Some(request.email.clone());
        Ok(Some(profile.clone()))
    }

    async fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), ClientError> {
        self.enter("change_password", "change_password").await?;
        *self.password.lock().unwrap() = Some(request.clone());
        Ok(())
    }
}
