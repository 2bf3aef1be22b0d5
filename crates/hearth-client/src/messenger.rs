//! Drives the [`ConversationCache`] from the network.
//!
//! Inbound `receive_message` frames arrive through a subscription on the
//! [`ConnectionManager`]; history comes from the [`Backend`]; sends go out
//! over the realtime channel and are failed if no echo arrives within the
//! confirmation window.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use hearth_net::{ConnectionManager, Subscription};
use hearth_shared::models::{InboundMessage, Message};
use hearth_shared::protocol::{ClientFrame, EventKind, OutgoingMessage, ServerFrame};
use hearth_shared::types::{LocalId, UserId};

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::conversation::{ConversationCache, HistoryOutcome, Received};
use crate::error::ClientError;
use crate::events::{EventBus, UiEvent};
use crate::session::SessionStore;

#[derive(Clone)]
pub struct Messenger {
    inner: Arc<MessengerInner>,
}

struct MessengerInner {
    session: SessionStore,
    backend: Arc<dyn Backend>,
    connection: ConnectionManager,
    events: EventBus,
    history_limit: u32,
    confirm_timeout: Duration,
    cache: Mutex<ConversationCache>,
    subscription: Mutex<Option<Subscription>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Messenger {
    pub fn new(
        session: SessionStore,
        backend: Arc<dyn Backend>,
        connection: ConnectionManager,
        events: EventBus,
        config: &ClientConfig,
    ) -> Self {
        Self {
            inner: Arc::new(MessengerInner {
                session,
                backend,
                connection,
                events,
                history_limit: config.history_limit,
                confirm_timeout: config.confirm_timeout,
                cache: Mutex::new(ConversationCache::new()),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Start receiving inbound messages. Re-attaching replaces the previous
    /// handler rather than adding a second one.
    pub fn attach(&self) {
        let weak: Weak<MessengerInner> = Arc::downgrade(&self.inner);
        let subscription = self
            .inner
            .connection
            .subscribe(EventKind::ReceiveMessage, move |frame| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if let ServerFrame::ReceiveMessage(message) = frame {
                    inner.receive(message.clone().into());
                }
            });

        *lock(&self.inner.subscription) = Some(subscription);
        debug!("Messenger attached to realtime channel");
    }

    pub fn detach(&self) {
        if lock(&self.inner.subscription).take().is_some() {
            debug!("Messenger detached from realtime channel");
        }
    }

    /// Select `peer` and backfill its history.
    ///
    /// If another selection happens before the fetch resolves, the response
    /// is dropped and [`HistoryOutcome::Stale`] returned.
    pub async fn select_peer(&self, peer: &UserId) -> Result<HistoryOutcome, ClientError> {
        let inner = &self.inner;
        let me = inner.session.user_id()?;

        let token = inner.cache().begin_select(peer);
        inner.events.emit(UiEvent::ConversationUpdated {
            peer_id: peer.clone(),
        });

        let history = match inner.backend.messages(peer, inner.history_limit).await {
            Ok(history) => history,
            Err(e) => {
                if !inner.cache().is_current(&token) {
                    debug!(peer = %peer, error = %e, "History fetch for deselected peer failed");
                    return Ok(HistoryOutcome::Stale);
                }
                inner.events.emit_error("select_peer", &e);
                return Err(e);
            }
        };

        let outcome = inner.cache().apply_history(&token, &me, history);
        match outcome {
            HistoryOutcome::Applied { messages } => {
                debug!(peer = %peer, messages, "History applied");
                inner.events.emit(UiEvent::ConversationUpdated {
                    peer_id: peer.clone(),
                });
            }
            HistoryOutcome::Stale => {
                debug!(peer = %peer, "Discarding stale history response");
            }
        }
        Ok(outcome)
    }

    /// Optimistically append `content` to the conversation with `peer` and
    /// emit it over the realtime channel.
    pub fn send_message(&self, peer: &UserId, content: &str) -> Result<LocalId, ClientError> {
        let inner = &self.inner;
        let me = inner.session.user_id()?;

        let message = match inner.cache().push_local(&me, peer, content) {
            Ok(message) => message,
            Err(e) => {
                inner.events.emit_error("send_message", &e);
                return Err(e.into());
            }
        };

        inner.events.emit(UiEvent::ConversationUpdated {
            peer_id: peer.clone(),
        });
        inner.dispatch(&me, &message);
        Ok(message.local_id)
    }

    /// Re-send a failed message. Returns `false` if it is not in the failed
    /// state (already confirmed, still pending, or unknown).
    pub fn retry(&self, peer: &UserId, local_id: LocalId) -> Result<bool, ClientError> {
        let inner = &self.inner;
        let me = inner.session.user_id()?;

        let Some(message) = inner.cache().retry(peer, local_id) else {
            return Ok(false);
        };

        info!(peer = %peer, %local_id, "Retrying message");
        inner.events.emit(UiEvent::ConversationUpdated {
            peer_id: peer.clone(),
        });
        inner.dispatch(&me, &message);
        Ok(true)
    }

    pub fn active_peer(&self) -> Option<UserId> {
        self.inner.cache().active().cloned()
    }

    pub fn messages(&self, peer: &UserId) -> Vec<Message> {
        self.inner.cache().messages(peer).to_vec()
    }

    pub fn active_messages(&self) -> Vec<Message> {
        self.inner.cache().active_messages().to_vec()
    }

    /// Drop every cached conversation (sign-out).
    pub fn reset(&self) {
        *self.inner.cache() = ConversationCache::new();
    }
}

impl MessengerInner {
    fn cache(&self) -> MutexGuard<'_, ConversationCache> {
        lock(&self.cache)
    }

    fn receive(self: &Arc<Self>, inbound: InboundMessage) {
        let Ok(me) = self.session.user_id() else {
            warn!(server_id = %inbound.server_id, "Inbound message without a session, dropping");
            return;
        };

        let received = self.cache().receive(&me, inbound);
        match received {
            Received::Confirmed { peer_id, local_id } => {
                debug!(peer = %peer_id, %local_id, "Message confirmed");
                self.events.emit(UiEvent::ConversationUpdated { peer_id });
            }
            Received::Appended { peer_id, .. } => {
                debug!(peer = %peer_id, "Message received");
                self.events.emit(UiEvent::ConversationUpdated { peer_id });
            }
            Received::Duplicate => debug!("Ignoring duplicate message"),
        }
    }

    fn dispatch(self: &Arc<Self>, me: &UserId, message: &Message) {
        self.connection.send(ClientFrame::SendMessage(OutgoingMessage {
            from: me.clone(),
            to: message.peer_id.clone(),
            message: message.content.clone(),
        }));
        self.schedule_expiry(message.peer_id.clone(), message.local_id, message.created_at);
    }

    fn schedule_expiry(self: &Arc<Self>, peer: UserId, local_id: LocalId, sent_at: DateTime<Utc>) {
        let weak = Arc::downgrade(self);
        let timeout = self.confirm_timeout;

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };

            let expired = inner.cache().expire(&peer, local_id, sent_at);
            if expired {
                warn!(peer = %peer, %local_id, "Message not confirmed in time");
                inner.events.emit(UiEvent::MessageFailed {
                    peer_id: peer,
                    local_id,
                });
            }
        });
    }
}
