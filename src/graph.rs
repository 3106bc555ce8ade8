//! The social graph facade.
//!
//! One [`SocialGraph`] is built at start-up over a key-value backend and
//! handed by reference to everything that reads or mutates relationships.
//! It owns the event bus, records inbox notifications for the events the
//! stores emit, and applies the policy gates the raw stores leave open.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::env_flag;
use crate::core::errors::{GraphResult, Outcome};
use crate::core::kv::KeyValue;
use crate::events::{EventBus, EventSink, GraphEvent};
use crate::feed::project_feed;
use crate::follow::RelationshipStore;
use crate::messages::MessageStore;
use crate::models::models::{Post, UserId};
use crate::notifications::NotificationInbox;
use crate::posts::PostStore;
use crate::visibility::VisibilityStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphPolicy {
    /// Direct follows of private accounts are refused; they must go through a request.
    pub enforce_private_gate: bool,
    /// Message requests require the requester to follow the target.
    pub message_requires_follow: bool,
    /// Unfollowing also drops the message permission between the pair.
    pub unfollow_revokes_messages: bool,
}

impl Default for GraphPolicy {
    fn default() -> Self {
        GraphPolicy {
            enforce_private_gate: true,
            message_requires_follow: false,
            unfollow_revokes_messages: false,
        }
    }
}

impl GraphPolicy {
    pub fn from_env() -> Self {
        let defaults = GraphPolicy::default();
        GraphPolicy {
            enforce_private_gate: env_flag("PEDAL_ENFORCE_PRIVATE_GATE", defaults.enforce_private_gate),
            message_requires_follow: env_flag(
                "PEDAL_MESSAGE_REQUIRES_FOLLOW",
                defaults.message_requires_follow,
            ),
            unfollow_revokes_messages: env_flag(
                "PEDAL_UNFOLLOW_REVOKES_MESSAGES",
                defaults.unfollow_revokes_messages,
            ),
        }
    }
}

/// Which path a follow action took.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FollowRoute {
    Direct,
    Request,
}

pub struct SocialGraph<S> {
    kv: S,
    policy: GraphPolicy,
    bus: EventBus,
}

impl<S: KeyValue> SocialGraph<S> {
    pub fn new(kv: S, policy: GraphPolicy) -> Self {
        SocialGraph {
            kv,
            policy,
            bus: EventBus::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.kv
    }

    pub fn policy(&self) -> &GraphPolicy {
        &self.policy
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn relationships(&self) -> RelationshipStore<'_, S> {
        RelationshipStore::new(&self.kv, self)
    }

    pub fn messages(&self) -> MessageStore<'_, S> {
        MessageStore::new(&self.kv, self)
    }

    pub fn visibility(&self) -> VisibilityStore<'_, S> {
        VisibilityStore::new(&self.kv, self)
    }

    pub fn inbox(&self) -> NotificationInbox<'_, S> {
        NotificationInbox::new(&self.kv)
    }

    pub fn posts(&self) -> PostStore<'_, S> {
        PostStore::new(&self.kv)
    }

    /// Direct follow; refused for private targets while the gate is enforced.
    pub fn follow(&self, follower: &UserId, following: &UserId) -> GraphResult<Outcome> {
        if self.policy.enforce_private_gate
            && follower != following
            && self.visibility().is_private(following)?
        {
            debug!(%follower, %following, "Direct follow of private account refused");
            return Ok(Outcome::NotAllowed);
        }
        self.relationships().follow(follower, following)
    }

    /// Follow button dispatch: public targets are followed, private ones get a request.
    pub fn follow_or_request(
        &self,
        follower: &UserId,
        following: &UserId,
    ) -> GraphResult<(FollowRoute, Outcome)> {
        if self.visibility().is_private(following)? {
            let outcome = self.relationships().request_follow(follower, following)?;
            Ok((FollowRoute::Request, outcome))
        } else {
            let outcome = self.relationships().follow(follower, following)?;
            Ok((FollowRoute::Direct, outcome))
        }
    }

    pub fn unfollow(&self, follower: &UserId, following: &UserId) -> GraphResult<Outcome> {
        let outcome = self.relationships().unfollow(follower, following)?;
        if outcome.changed() && self.policy.unfollow_revokes_messages {
            self.messages().revoke_message(follower, following)?;
        }
        Ok(outcome)
    }

    pub fn request_message(&self, from: &UserId, to: &UserId) -> GraphResult<Outcome> {
        if self.policy.message_requires_follow
            && from != to
            && !self.relationships().is_following(from, to)?
        {
            return Ok(Outcome::NotAllowed);
        }
        self.messages().request_message(from, to)
    }

    /// Public profiles are open to everyone; private ones to the owner and accepted followers.
    pub fn can_view_profile(&self, viewer: Option<&UserId>, owner: &UserId) -> GraphResult<bool> {
        if !self.visibility().is_private(owner)? {
            return Ok(true);
        }
        match viewer {
            Some(v) if v == owner => Ok(true),
            Some(v) => self.relationships().is_following(v, owner),
            None => Ok(false),
        }
    }

    pub fn feed(&self, viewer: &UserId) -> GraphResult<Vec<Post>> {
        let following = self.relationships().list_following(viewer)?;
        Ok(project_feed(self.posts().all()?, viewer, &following))
    }
}

/// Listeners always hear about a persisted change. The inbox write is best effort:
/// its failure is logged and never turns a completed mutation into an error.
impl<S: KeyValue> EventSink for SocialGraph<S> {
    fn emit(&self, event: GraphEvent) -> GraphResult<()> {
        self.bus.publish(&event);
        if let Err(err) = self.inbox().record(&event) {
            warn!(event = event.name(), error = %err, "Inbox write failed");
        }
        Ok(())
    }
}
