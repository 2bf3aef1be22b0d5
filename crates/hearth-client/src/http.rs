//! [`Backend`] over HTTP with `reqwest`.
//!
//! Every request carries the session's bearer credential; without one the
//! call fails with [`ClientError::Unauthenticated`] before touching the
//! network.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use hearth_shared::api::{
    ApiErrorBody, ChangePasswordRequest, CommentRequest, CommentResponse, FeedResponse,
    FriendRequestsResponse, FriendsResponse, LikeResponse, MeResponse, MessagesResponse,
    MyPostsResponse, NotificationsResponse, PostResponse, RejectedRequestsResponse, StatusChangeRequest,
    UpdateProfileRequest, UpdateProfileResponse,
};
use hearth_shared::models::{
    FeedPage, FriendRequest, InboundMessage, Notification, Peer, Post, Profile, RequestStatus,
};
use hearth_shared::types::{NotificationId, PostId, UserId};

use crate::backend::Backend;
use crate::error::ClientError;
use crate::session::SessionStore;

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    session: SessionStore,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hearth/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let credential = self.session.credential()?;
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "REST request");
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(credential.expose()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.request(Method::GET, path)?.send().await?;
        decode(resp).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let resp = self.request(method, path)?.json(body).send().await?;
        decode(resp).await
    }

    /// For endpoints whose success body carries nothing we use.
    async fn call(&self, method: Method, path: &str) -> Result<(), ClientError> {
        let resp = self.request(method, path)?.send().await?;
        check(resp).await.map(|_| ())
    }

    async fn call_json<B>(&self, method: Method, path: &str, body: &B) -> Result<(), ClientError>
    where
        B: Serialize + Sync,
    {
        let resp = self.request(method, path)?.json(body).send().await?;
        check(resp).await.map(|_| ())
    }
}

async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = match resp.json::<ApiErrorBody>().await {
        Ok(ApiErrorBody { message: Some(m) }) => m,
        _ => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };

    Err(ClientError::Http {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let resp = check(resp).await?;
    resp.json::<T>()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))
}

#[async_trait]
impl Backend for HttpBackend {
    async fn friends(&self) -> Result<Vec<Peer>, ClientError> {
        let resp: FriendsResponse = self.get("/friendrequest/getFriends").await?;
        Ok(resp.friends.into_iter().map(Peer::from).collect())
    }

    async fn all_friends(&self) -> Result<Vec<Peer>, ClientError> {
        let resp: FriendsResponse = self.get("/friendrequest/getAllFriends").await?;
        Ok(resp.friends.into_iter().map(Peer::from).collect())
    }

    async fn friend_requests(&self) -> Result<Vec<FriendRequest>, ClientError> {
        let resp: FriendRequestsResponse = self.get("/friendrequest/getfriendrequests").await?;
        Ok(resp.friend_requests.into_iter().map(FriendRequest::from).collect())
    }

    async fn rejected_requests(&self) -> Result<Vec<FriendRequest>, ClientError> {
        let resp: RejectedRequestsResponse = self.get("/friendrequest/rejected").await?;
        Ok(resp.rejected_requests.into_iter().map(FriendRequest::from).collect())
    }

    async fn respond_friend_request(
        &self,
        request_id: &str,
        status: RequestStatus,
    ) -> Result<(), ClientError> {
        let body = StatusChangeRequest {
            request_id: request_id.to_string(),
            status,
        };
        self.call_json(Method::POST, "/friendrequest/stauschange", &body)
            .await
    }

    async fn messages(&self, peer: &UserId, limit: u32) -> Result<Vec<InboundMessage>, ClientError> {
        let path = format!("/message/getMessages/{peer}?limit={limit}");
        let resp: MessagesResponse = self.get(&path).await?;

        let mut messages: Vec<InboundMessage> =
            resp.messages.into_iter().map(InboundMessage::from).collect();
        // Older backends ignore `limit`; keep the newest `limit` entries.
        let excess = messages.len().saturating_sub(limit as usize);
        messages.drain(..excess);
        Ok(messages)
    }

    async fn feed(&self, page: u32, limit: u32) -> Result<FeedPage, ClientError> {
        let resp: FeedResponse = self
            .get(&format!("/post/feed?page={page}&limit={limit}"))
            .await?;
        Ok(resp.into())
    }

    async fn my_posts(&self) -> Result<Vec<Post>, ClientError> {
        let resp: MyPostsResponse = self.get("/post/myposts").await?;
        Ok(resp.posts.into_iter().map(Post::from).collect())
    }

    async fn create_post(&self, text: &str) -> Result<Post, ClientError> {
        let form = reqwest::multipart::Form::new().text("text", text.to_string());
        let resp = self
            .request(Method::POST, "/post/create")?
            .multipart(form)
            .send()
            .await?;
        let body: PostResponse = decode(resp).await?;
        Ok(body.post.into())
    }

    async fn delete_post(&self, post: &PostId) -> Result<(), ClientError> {
        self.call(Method::DELETE, &format!("/post/delete/{post}")).await
    }

    async fn like_post(&self, post: &PostId) -> Result<u32, ClientError> {
        let resp = self
            .request(Method::POST, &format!("/post/like/{post}"))?
            .send()
            .await?;
        let body: LikeResponse = decode(resp).await?;
        Ok(body.likes.count())
    }

    async fn comment_post(&self, post: &PostId, text: &str) -> Result<u32, ClientError> {
        let body = CommentRequest {
            text: text.to_string(),
        };
        let resp: CommentResponse = self
            .send_json(Method::POST, &format!("/post/comment/{post}"), &body)
            .await?;
        Ok(resp.comments.count())
    }

    async fn notifications(&self) -> Result<Vec<Notification>, ClientError> {
        let resp: NotificationsResponse = self.get("/notification/getNotifications").await?;
        Ok(resp.notifications.into_iter().map(Notification::from).collect())
    }

    async fn mark_notification_read(&self, id: &NotificationId) -> Result<(), ClientError> {
        self.call(Method::POST, &format!("/notification/markChecked/{id}"))
            .await
    }

    async fn mark_all_notifications_read(&self) -> Result<(), ClientError> {
        self.call(Method::POST, "/notification/markAllChecked").await
    }

    async fn me(&self) -> Result<Profile, ClientError> {
        let resp: MeResponse = self.get("/user/me").await?;
        Ok(resp.into_user().into())
    }

    async fn update_profile(
        &self,
        request: &UpdateProfileRequest,
    ) -> Result<Option<Profile>, ClientError> {
        let resp: UpdateProfileResponse =
            self.send_json(Method::PUT, "/user/update", request).await?;
        Ok(resp.user.map(Profile::from))
    }

    async fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), ClientError> {
        self.call_json(Method::POST, "/user/change-password", request)
            .await
    }
}
