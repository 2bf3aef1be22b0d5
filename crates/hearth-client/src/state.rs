//! Application state shared by the presentation layer.
//!
//! [`AppState`] wires every component to one [`SessionStore`], one
//! [`ConnectionManager`] and one [`EventBus`]. Components never reach into
//! each other; cross-component effects go through subscriptions and events.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::info;

use hearth_net::{ConnectionManager, Connector};
use hearth_shared::models::Identity;

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::{EventBus, UiEvent};
use crate::feed::FeedPaginator;
use crate::friends::Friends;
use crate::messenger::Messenger;
use crate::notifications::NotificationReconciler;
use crate::profile::ProfileService;
use crate::session::SessionStore;

/// Central application state.
pub struct AppState {
    pub config: ClientConfig,

    /// The signed-in identity. Read-only to everything but sign-in/out and
    /// profile updates.
    pub session: SessionStore,

    /// Sole owner of the realtime transport.
    pub connection: ConnectionManager,

    /// UI-facing change notifications.
    pub events: EventBus,

    pub messenger: Messenger,
    pub feed: FeedPaginator,
    pub notifications: NotificationReconciler,
    pub friends: Friends,
    pub profile: ProfileService,

    /// Forwards connection status changes to the event bus while online.
    status_bridge: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    pub fn new(
        config: ClientConfig,
        session: SessionStore,
        backend: Arc<dyn Backend>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let events = EventBus::default();
        let connection = ConnectionManager::new(connector, config.connection_config());

        let messenger = Messenger::new(
            session.clone(),
            backend.clone(),
            connection.clone(),
            events.clone(),
            &config,
        );
        let feed = FeedPaginator::new(backend.clone(), events.clone(), config.feed_page_size);
        let notifications = NotificationReconciler::new(backend.clone(), events.clone());
        let friends = Friends::new(backend.clone(), events.clone());
        let profile = ProfileService::new(backend, session.clone(), events.clone());

        Self {
            config,
            session,
            connection,
            events,
            messenger,
            feed,
            notifications,
            friends,
            profile,
            status_bridge: Mutex::new(None),
        }
    }

    /// Go online with the stored session: attach the messenger and open the
    /// realtime channel. Calling it again while online is harmless.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), ClientError> {
        let credential = self.session.credential()?;

        let mut bridge = self
            .status_bridge
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if bridge.as_ref().map_or(true, JoinHandle::is_finished) {
            let mut status = self.connection.watch_status();
            let events = self.events.clone();
            *bridge = Some(tokio::spawn(async move {
                while status.changed().await.is_ok() {
                    let current = *status.borrow_and_update();
                    events.emit(UiEvent::ConnectionStatusChanged { status: current });
                }
            }));
        }
        drop(bridge);

        self.messenger.attach();
        self.connection.connect(credential);

        Ok(())
    }

    pub fn sign_in(&self, identity: Identity) -> Result<(), ClientError> {
        self.session.sign_in(identity)?;
        self.start()
    }

    /// Disconnect, drop every cached view and forget the session.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        self.messenger.detach();
        self.connection.disconnect().await;

        let bridge = self
            .status_bridge
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(bridge) = bridge {
            bridge.abort();
        }

        self.messenger.reset();
        self.feed.reset();
        self.notifications.clear();
        self.friends.clear();
        self.session.sign_out()?;

        info!("Session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hearth_net::MemoryConnector;
    use hearth_shared::protocol::ClientFrame;
    use hearth_shared::types::{ConnectionStatus, Credential, UserId};

    use crate::testing::{inbound, page, MockBackend};

    fn identity() -> Identity {
        Identity {
            user_id: UserId::new("me"),
            display_name: "Me".into(),
            avatar_url: None,
            credential: Credential::new("tok"),
        }
    }

    #[tokio::test]
    async fn test_start_requires_session() {
        let (connector, _server) = MemoryConnector::pair();
        let state = AppState::new(
            ClientConfig::default(),
            SessionStore::ephemeral(),
            MockBackend::new(),
            Arc::new(connector),
        );
        assert!(matches!(state.start(), Err(ClientError::Unauthenticated)));
        assert_eq!(state.connection.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_sign_in_connects_and_sign_out_clears_everything() {
        let (connector, mut server) = MemoryConnector::pair();
        let backend = MockBackend::new();
        backend.pages.lock().unwrap().insert(1, page(&["a"], false));
        backend
            .histories
            .lock()
            .unwrap()
            .insert(UserId::new("p1"), vec![inbound("m1", "p1", "me", "hi")]);

        let state = AppState::new(
            ClientConfig::default(),
            SessionStore::ephemeral(),
            backend,
            Arc::new(connector),
        );
        let mut events = state.events.subscribe();

        state.sign_in(identity()).unwrap();
        let mut peer = tokio::time::timeout(Duration::from_secs(2), server.accept())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            peer.recv_frame().await,
            Some(ClientFrame::Setup(Credential::new("tok")))
        );

        let connected = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(UiEvent::ConnectionStatusChanged {
                    status: ConnectionStatus::Connected,
                }) = events.recv().await
                {
                    break;
                }
            }
        })
        .await;
        assert!(connected.is_ok());

        state.feed.load_next().await.unwrap();
        state.messenger.select_peer(&UserId::new("p1")).await.unwrap();
        assert_eq!(state.messenger.active_messages().len(), 1);

        state.sign_out().await.unwrap();
        assert!(!state.session.is_signed_in());
        assert_eq!(state.connection.status(), ConnectionStatus::Disconnected);
        assert_eq!(state.connection.subscriber_count(), 0);
        assert!(state.feed.items().is_empty());
        assert!(state.messenger.active_messages().is_empty());
    }
}
