//! Conversation Cache.
//!
//! Per-peer message history with optimistic local appends, reconciled
//! against server copies. Pure state: all I/O lives in
//! [`crate::messenger::Messenger`].
//!
//! Every conversation is laid out as the confirmed messages in delivery
//! order followed by the unconfirmed tail (pending and failed) in send order.
//! Confirmed arrivals are inserted at the boundary, so the tail always stays
//! last and is never reordered.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use hearth_shared::constants::RECONCILE_SKEW_SECS;
use hearth_shared::error::ValidationError;
use hearth_shared::models::{DeliveryState, InboundMessage, Message};
use hearth_shared::types::{LocalId, MessageId, UserId};

/// Issued by [`ConversationCache::begin_select`]; a history response is
/// only applied if its token is still the latest one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionToken {
    peer_id: UserId,
    seq: u64,
}

impl SelectionToken {
    pub fn peer_id(&self) -> &UserId {
        &self.peer_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    Applied { messages: usize },
    /// A newer selection superseded this one; nothing changed.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Matched one of our unconfirmed sends.
    Confirmed { peer_id: UserId, local_id: LocalId },
    /// A new message (the peer's, or ours from another session).
    Appended { peer_id: UserId, local_id: LocalId },
    /// Server id already present.
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    peer_id: UserId,
    messages: Vec<Message>,
}

impl Conversation {
    fn new(peer_id: UserId) -> Self {
        Self {
            peer_id,
            messages: Vec::new(),
        }
    }

    pub fn peer_id(&self) -> &UserId {
        &self.peer_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn confirmed_len(&self) -> usize {
        self.messages.iter().take_while(|m| m.is_confirmed()).count()
    }

    fn push_confirmed(&mut self, message: Message) {
        let at = self.confirmed_len();
        self.messages.insert(at, message);
    }

    fn contains_server_id(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| m.server_id.as_ref() == Some(id))
    }

    fn find_mut(&mut self, local_id: LocalId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.local_id == local_id)
    }

    /// First unconfirmed entry with this sender and content, in send order.
    fn match_unconfirmed(&self, sender: &UserId, content: &str) -> Option<usize> {
        self.messages
            .iter()
            .position(|m| !m.is_confirmed() && m.sender_id == *sender && m.content == content)
    }

    fn confirm_at(&mut self, idx: usize, server_id: MessageId, created_at: DateTime<Utc>) -> LocalId {
        let mut message = self.messages.remove(idx);
        confirm(&mut message, server_id, created_at);
        let local_id = message.local_id;
        self.push_confirmed(message);
        local_id
    }
}

fn confirm(message: &mut Message, server_id: MessageId, created_at: DateTime<Utc>) {
    message.server_id = Some(server_id);
    message.created_at = created_at;
    message.delivery = DeliveryState::Confirmed;
}

fn from_inbound(inbound: InboundMessage, peer_id: UserId) -> Message {
    Message {
        local_id: LocalId::new(),
        server_id: Some(inbound.server_id),
        sender_id: inbound.sender_id,
        peer_id,
        content: inbound.content,
        created_at: inbound.created_at,
        delivery: DeliveryState::Confirmed,
    }
}

#[derive(Debug, Default)]
pub struct ConversationCache {
    conversations: HashMap<UserId, Conversation>,
    active: Option<UserId>,
    seq: u64,
}

impl ConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `peer` the active conversation (created lazily) and return the
    /// token its history response must present.
    pub fn begin_select(&mut self, peer: &UserId) -> SelectionToken {
        self.seq += 1;
        self.active = Some(peer.clone());
        self.conversation_mut(peer);
        SelectionToken {
            peer_id: peer.clone(),
            seq: self.seq,
        }
    }

    pub fn is_current(&self, token: &SelectionToken) -> bool {
        token.seq == self.seq && self.active.as_ref() == Some(&token.peer_id)
    }

    /// Replace the conversation with the server's history.
    ///
    /// Confirmed messages that arrived in realtime but are missing from the
    /// snapshot are kept after it; the unconfirmed tail is kept last, minus
    /// any send whose stored copy appears in the snapshot.
    pub fn apply_history(
        &mut self,
        token: &SelectionToken,
        me: &UserId,
        history: Vec<InboundMessage>,
    ) -> HistoryOutcome {
        if !self.is_current(token) {
            return HistoryOutcome::Stale;
        }

        let peer = token.peer_id.clone();
        let conv = self.conversation_mut(&peer);
        let previous = std::mem::take(&mut conv.messages);

        let (confirmed, mut tail): (Vec<Message>, Vec<Message>) =
            previous.into_iter().partition(Message::is_confirmed);

        let index: HashMap<MessageId, usize> = confirmed
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.server_id.clone().map(|id| (id, i)))
            .collect();
        let mut known: Vec<Option<Message>> = confirmed.into_iter().map(Some).collect();

        let skew = Duration::seconds(RECONCILE_SKEW_SECS);
        let mut seen = HashSet::new();
        let mut merged = Vec::with_capacity(history.len() + tail.len());

        for item in history {
            if !seen.insert(item.server_id.clone()) {
                continue;
            }

            if let Some(existing) = index.get(&item.server_id).and_then(|&i| known[i].take()) {
                merged.push(existing);
                continue;
            }

            if item.sender_id == *me {
                let matched = tail.iter().position(|m| {
                    m.content == item.content && item.created_at >= m.created_at - skew
                });
                if let Some(idx) = matched {
                    let mut message = tail.remove(idx);
                    confirm(&mut message, item.server_id, item.created_at);
                    merged.push(message);
                    continue;
                }
            }

            merged.push(from_inbound(item, peer.clone()));
        }

        merged.extend(known.into_iter().flatten());
        merged.extend(tail);

        conv.messages = merged;
        HistoryOutcome::Applied {
            messages: conv.messages.len(),
        }
    }

    /// Append a pending message for `peer`, which must be the selected peer.
    pub fn push_local(
        &mut self,
        me: &UserId,
        peer: &UserId,
        content: &str,
    ) -> Result<Message, ValidationError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        if self.active.as_ref() != Some(peer) {
            return Err(ValidationError::NoPeerSelected);
        }

        let message = Message {
            local_id: LocalId::new(),
            server_id: None,
            sender_id: me.clone(),
            peer_id: peer.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
            delivery: DeliveryState::Pending,
        };
        self.conversation_mut(peer).messages.push(message.clone());
        Ok(message)
    }

    /// Reconcile a server-originated message.
    pub fn receive(&mut self, me: &UserId, inbound: InboundMessage) -> Received {
        let peer = if inbound.sender_id == *me {
            inbound.receiver_id.clone()
        } else {
            inbound.sender_id.clone()
        };
        let conv = self.conversation_mut(&peer);

        if conv.contains_server_id(&inbound.server_id) {
            return Received::Duplicate;
        }

        // Failed entries still match: a late echo means the send went through.
        match conv.match_unconfirmed(&inbound.sender_id, &inbound.content) {
            Some(idx) => {
                let local_id = conv.confirm_at(idx, inbound.server_id, inbound.created_at);
                Received::Confirmed {
                    peer_id: peer,
                    local_id,
                }
            }
            None => {
                let message = from_inbound(inbound, peer.clone());
                let local_id = message.local_id;
                conv.push_confirmed(message);
                Received::Appended {
                    peer_id: peer,
                    local_id,
                }
            }
        }
    }

    /// Mark a send failed if it is still pending from the attempt made at
    /// `sent_at`. Returns whether anything changed.
    pub fn expire(&mut self, peer: &UserId, local_id: LocalId, sent_at: DateTime<Utc>) -> bool {
        let Some(message) = self
            .conversations
            .get_mut(peer)
            .and_then(|c| c.find_mut(local_id))
        else {
            return false;
        };

        if message.delivery != DeliveryState::Pending || message.created_at != sent_at {
            return false;
        }
        message.delivery = DeliveryState::Failed;
        true
    }

    /// Move a failed message back to pending for another attempt.
    pub fn retry(&mut self, peer: &UserId, local_id: LocalId) -> Option<Message> {
        let message = self
            .conversations
            .get_mut(peer)
            .and_then(|c| c.find_mut(local_id))?;

        if message.delivery != DeliveryState::Failed {
            return None;
        }
        message.delivery = DeliveryState::Pending;
        message.created_at = Utc::now();
        Some(message.clone())
    }

    pub fn active(&self) -> Option<&UserId> {
        self.active.as_ref()
    }

    pub fn conversation(&self, peer: &UserId) -> Option<&Conversation> {
        self.conversations.get(peer)
    }

    pub fn messages(&self, peer: &UserId) -> &[Message] {
        self.conversations
            .get(peer)
            .map(Conversation::messages)
            .unwrap_or_default()
    }

    pub fn active_messages(&self) -> &[Message] {
        match &self.active {
            Some(peer) => self.messages(peer),
            None => &[],
        }
    }

    fn conversation_mut(&mut self, peer: &UserId) -> &mut Conversation {
        self.conversations
            .entry(peer.clone())
            .or_insert_with(|| Conversation::new(peer.clone()))
    }
}
