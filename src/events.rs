//! Change notifications for graph mutations.
//!
//! The [`EventBus`] is a synchronous publish/subscribe hub: listeners run on
//! the publishing thread, in subscription order, before the mutating call
//! returns. Delivery works on a snapshot of the listener list, so a listener
//! may subscribe or unsubscribe while an event is being delivered.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::core::errors::GraphResult;
use crate::models::models::UserId;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Follow,
    Unfollow,
    FollowRequest,
    FollowAccept,
    FollowDecline,
    MsgRequest,
    MsgAccept,
    MsgDecline,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Follow => "follow",
            EventKind::Unfollow => "unfollow",
            EventKind::FollowRequest => "follow_request",
            EventKind::FollowAccept => "follow_accept",
            EventKind::FollowDecline => "follow_decline",
            EventKind::MsgRequest => "msg_request",
            EventKind::MsgAccept => "msg_accept",
            EventKind::MsgDecline => "msg_decline",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphEvent {
    /// `from` is the follower or message requester, `to` the other side.
    Pair {
        kind: EventKind,
        from: UserId,
        to: UserId,
        at: DateTime<Utc>,
    },
    VisibilityChanged {
        user: UserId,
        is_private: bool,
        at: DateTime<Utc>,
    },
}

impl GraphEvent {
    pub fn pair(kind: EventKind, from: &UserId, to: &UserId) -> Self {
        GraphEvent::Pair {
            kind,
            from: from.clone(),
            to: to.clone(),
            at: Utc::now(),
        }
    }

    pub fn kind(&self) -> Option<EventKind> {
        match self {
            GraphEvent::Pair { kind, .. } => Some(*kind),
            GraphEvent::VisibilityChanged { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GraphEvent::Pair { kind, .. } => kind.as_str(),
            GraphEvent::VisibilityChanged { .. } => "visibility_changed",
        }
    }
}

/// Where stores send the events their mutations produce.
pub trait EventSink {
    fn emit(&self, event: GraphEvent) -> GraphResult<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&GraphEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns false when the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn publish(&self, event: &GraphEvent) {
        let snapshot: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: GraphEvent) -> GraphResult<()> {
        self.publish(&event);
        Ok(())
    }
}
