//! Friends and friend requests.
//!
//! `friends` is the set of chat peers; `all_friends` backs the friends tab.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use hearth_shared::models::{FriendRequest, Peer, RequestStatus};

use crate::backend::Backend;
use crate::error::ClientError;
use crate::events::{EventBus, UiEvent};

#[derive(Debug, Default)]
struct FriendsState {
    friends: Vec<Peer>,
    all_friends: Vec<Peer>,
    pending: Vec<FriendRequest>,
    rejected: Vec<FriendRequest>,
}

#[derive(Clone)]
pub struct Friends {
    inner: Arc<FriendsInner>,
}

struct FriendsInner {
    backend: Arc<dyn Backend>,
    events: EventBus,
    state: Mutex<FriendsState>,
}

impl Friends {
    pub fn new(backend: Arc<dyn Backend>, events: EventBus) -> Self {
        Self {
            inner: Arc::new(FriendsInner {
                backend,
                events,
                state: Mutex::new(FriendsState::default()),
            }),
        }
    }

    pub async fn refresh_friends(&self) -> Result<Vec<Peer>, ClientError> {
        let friends = self
            .inner
            .backend
            .friends()
            .await
            .map_err(|e| self.report("load_friends", e))?;

        self.state().friends = friends.clone();
        self.inner.events.emit(UiEvent::FriendsUpdated);
        Ok(friends)
    }

    pub async fn refresh_all_friends(&self) -> Result<Vec<Peer>, ClientError> {
        let all = self
            .inner
            .backend
            .all_friends()
            .await
            .map_err(|e| self.report("load_all_friends", e))?;

        self.state().all_friends = all.clone();
        self.inner.events.emit(UiEvent::FriendsUpdated);
        Ok(all)
    }

    pub async fn refresh_requests(&self) -> Result<Vec<FriendRequest>, ClientError> {
        let pending = self
            .inner
            .backend
            .friend_requests()
            .await
            .map_err(|e| self.report("load_friend_requests", e))?;

        self.state().pending = pending.clone();
        self.inner.events.emit(UiEvent::FriendsUpdated);
        Ok(pending)
    }

    pub async fn refresh_rejected(&self) -> Result<Vec<FriendRequest>, ClientError> {
        let rejected = self
            .inner
            .backend
            .rejected_requests()
            .await
            .map_err(|e| self.report("load_rejected_requests", e))?;

        self.state().rejected = rejected.clone();
        self.inner.events.emit(UiEvent::FriendsUpdated);
        Ok(rejected)
    }

    pub async fn accept(&self, request_id: &str) -> Result<(), ClientError> {
        self.respond(request_id, RequestStatus::Accepted).await
    }

    pub async fn reject(&self, request_id: &str) -> Result<(), ClientError> {
        self.respond(request_id, RequestStatus::Rejected).await
    }

    /// Change a request's status, then refresh what it affects: the pending
    /// list always, both friend lists after an accept.
    pub async fn respond(&self, request_id: &str, status: RequestStatus) -> Result<(), ClientError> {
        self.inner
            .backend
            .respond_friend_request(request_id, status)
            .await
            .map_err(|e| self.report("respond_friend_request", e))?;

        info!(request = request_id, ?status, "Friend request updated");

        if status == RequestStatus::Accepted {
            self.refresh_friends().await?;
            self.refresh_all_friends().await?;
        }
        self.refresh_requests().await?;
        Ok(())
    }

    pub fn friends(&self) -> Vec<Peer> {
        self.state().friends.clone()
    }

    pub fn all_friends(&self) -> Vec<Peer> {
        self.state().all_friends.clone()
    }

    pub fn pending(&self) -> Vec<FriendRequest> {
        self.state().pending.clone()
    }

    pub fn rejected(&self) -> Vec<FriendRequest> {
        self.state().rejected.clone()
    }

    pub fn clear(&self) {
        *self.state() = FriendsState::default();
    }

    fn state(&self) -> MutexGuard<'_, FriendsState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, context: &'static str, e: ClientError) -> ClientError {
        self.inner.events.emit_error(context, &e);
        e
    }
}
