use std::collections::BTreeSet;

use spin_sdk::http::{Request, Response};
use tracing::debug;

use crate::core::errors::{ApiError, GraphResult, Outcome};
use crate::core::helpers::{acting_user, body_user_id, json_response, now, path_user_id};
use crate::core::kv::KeyValue;
use crate::core::table;
use crate::events::{EventKind, EventSink, GraphEvent};
use crate::graph::SocialGraph;
use crate::models::models::{is_valid_pair, FollowCounts, FollowEdge, FollowRequest, UserId};

/// Directed follow edges and pending follow requests.
pub struct RelationshipStore<'a, S> {
    kv: &'a S,
    events: &'a dyn EventSink,
}

impl<'a, S: KeyValue> RelationshipStore<'a, S> {
    pub fn new(kv: &'a S, events: &'a dyn EventSink) -> Self {
        RelationshipStore { kv, events }
    }

    fn edges(&self) -> GraphResult<Vec<FollowEdge>> {
        table::load(self.kv)
    }

    fn requests(&self) -> GraphResult<Vec<FollowRequest>> {
        table::load(self.kv)
    }

    pub fn list_following(&self, user: &UserId) -> GraphResult<BTreeSet<UserId>> {
        Ok(self
            .edges()?
            .into_iter()
            .filter(|e| &e.follower == user)
            .map(|e| e.following)
            .collect())
    }

    pub fn list_followers(&self, user: &UserId) -> GraphResult<BTreeSet<UserId>> {
        Ok(self
            .edges()?
            .into_iter()
            .filter(|e| &e.following == user)
            .map(|e| e.follower)
            .collect())
    }

    pub fn is_following(&self, follower: &UserId, following: &UserId) -> GraphResult<bool> {
        Ok(self.edges()?.iter().any(|e| e.matches(follower, following)))
    }

    pub fn counts(&self, user: &UserId) -> GraphResult<FollowCounts> {
        let edges = self.edges()?;
        Ok(FollowCounts {
            followers: edges.iter().filter(|e| &e.following == user).count(),
            following: edges.iter().filter(|e| &e.follower == user).count(),
        })
    }

    pub fn follow(&self, follower: &UserId, following: &UserId) -> GraphResult<Outcome> {
        if !is_valid_pair(follower, following) {
            return Ok(Outcome::InvalidPair);
        }
        let mut edges = self.edges()?;
        if edges.iter().any(|e| e.matches(follower, following)) {
            return Ok(Outcome::AlreadyExists);
        }
        edges.push(FollowEdge {
            follower: follower.clone(),
            following: following.clone(),
            created_at: now(),
        });
        table::save(self.kv, &edges)?;
        // A request is meaningless once the edge exists.
        self.drop_request(follower, following)?;

        debug!(%follower, %following, "Follow edge created");
        self.events
            .emit(GraphEvent::pair(EventKind::Follow, follower, following))?;
        Ok(Outcome::Created)
    }

    pub fn unfollow(&self, follower: &UserId, following: &UserId) -> GraphResult<Outcome> {
        let mut edges = self.edges()?;
        let before = edges.len();
        edges.retain(|e| !e.matches(follower, following));
        if edges.len() == before {
            return Ok(Outcome::NotFound);
        }
        table::save(self.kv, &edges)?;

        debug!(%follower, %following, "Follow edge removed");
        self.events
            .emit(GraphEvent::pair(EventKind::Unfollow, follower, following))?;
        Ok(Outcome::Removed)
    }

    pub fn request_follow(&self, follower: &UserId, following: &UserId) -> GraphResult<Outcome> {
        if !is_valid_pair(follower, following) {
            return Ok(Outcome::InvalidPair);
        }
        if self.is_following(follower, following)? {
            return Ok(Outcome::AlreadyExists);
        }
        let mut requests = self.requests()?;
        if requests.iter().any(|r| r.matches(follower, following)) {
            return Ok(Outcome::AlreadyExists);
        }
        requests.push(FollowRequest {
            follower: follower.clone(),
            following: following.clone(),
            created_at: now(),
        });
        table::save(self.kv, &requests)?;

        debug!(%follower, %following, "Follow request created");
        self.events
            .emit(GraphEvent::pair(EventKind::FollowRequest, follower, following))?;
        Ok(Outcome::Created)
    }

    /// Converts a pending request into an edge. Ignores any visibility gate.
    ///
    /// `Created` when the edge is new, `Removed` when only the stale request went away.
    pub fn accept_request(&self, follower: &UserId, following: &UserId) -> GraphResult<Outcome> {
        if !self.drop_request(follower, following)? {
            return Ok(Outcome::NotFound);
        }
        let outcome = match self.follow(follower, following)? {
            Outcome::Created => Outcome::Created,
            _ => Outcome::Removed,
        };

        self.events
            .emit(GraphEvent::pair(EventKind::FollowAccept, follower, following))?;
        Ok(outcome)
    }

    pub fn decline_request(&self, follower: &UserId, following: &UserId) -> GraphResult<Outcome> {
        if !self.drop_request(follower, following)? {
            return Ok(Outcome::NotFound);
        }
        self.events
            .emit(GraphEvent::pair(EventKind::FollowDecline, follower, following))?;
        Ok(Outcome::Removed)
    }

    /// The requester withdraws; reported to listeners like a decline.
    pub fn cancel_request(&self, follower: &UserId, following: &UserId) -> GraphResult<Outcome> {
        self.decline_request(follower, following)
    }

    pub fn list_incoming_requests(&self, user: &UserId) -> GraphResult<Vec<FollowRequest>> {
        Ok(self
            .requests()?
            .into_iter()
            .filter(|r| &r.following == user)
            .collect())
    }

    pub fn list_sent_requests(&self, user: &UserId) -> GraphResult<Vec<FollowRequest>> {
        Ok(self
            .requests()?
            .into_iter()
            .filter(|r| &r.follower == user)
            .collect())
    }

    pub fn has_pending_request(&self, follower: &UserId, following: &UserId) -> GraphResult<bool> {
        Ok(self.requests()?.iter().any(|r| r.matches(follower, following)))
    }

    fn drop_request(&self, follower: &UserId, following: &UserId) -> GraphResult<bool> {
        let mut requests = self.requests()?;
        let before = requests.len();
        requests.retain(|r| !r.matches(follower, following));
        if requests.len() == before {
            return Ok(false);
        }
        table::save(self.kv, &requests)?;
        Ok(true)
    }
}

// === HTTP Handlers ===

fn outcome_response(outcome: Outcome, extra: serde_json::Value) -> Response {
    let mut body = serde_json::json!({ "status": outcome });
    if let (Some(map), serde_json::Value::Object(extra)) = (body.as_object_mut(), extra) {
        map.extend(extra);
    }
    json_response(outcome.http_status(), &body)
}

pub fn handle_follow<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    let target = match body_user_id(&req, "target") {
        Ok(Some(t)) => t,
        Ok(None) => return Ok(ApiError::BadRequest("Invalid target user".to_string()).into()),
        Err(err) => return Ok(err.into()),
    };

    let (route, outcome) = graph.follow_or_request(&user_id, &target)?;
    Ok(outcome_response(outcome, serde_json::json!({ "route": route })))
}

pub fn handle_unfollow<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    let target = match body_user_id(&req, "target") {
        Ok(Some(t)) => t,
        Ok(None) => return Ok(ApiError::BadRequest("Invalid target user".to_string()).into()),
        Err(err) => return Ok(err.into()),
    };

    let outcome = graph.unfollow(&user_id, &target)?;
    Ok(outcome_response(outcome, serde_json::json!({})))
}

/// Accept, decline and cancel share one shape: the acting user plus one counterpart.
pub fn handle_request_action<S: KeyValue>(
    graph: &SocialGraph<S>,
    req: Request,
    action: &str,
) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    let field = if action == "cancel" { "target" } else { "follower" };
    let other = match body_user_id(&req, field) {
        Ok(Some(o)) => o,
        Ok(None) => return Ok(ApiError::BadRequest(format!("{} is required", field)).into()),
        Err(err) => return Ok(err.into()),
    };

    let store = graph.relationships();
    let outcome = match action {
        "accept" => store.accept_request(&other, &user_id)?,
        "decline" => store.decline_request(&other, &user_id)?,
        "cancel" => store.cancel_request(&user_id, &other)?,
        _ => return Ok(ApiError::NotFound("Unknown request action".to_string()).into()),
    };
    Ok(outcome_response(outcome, serde_json::json!({})))
}

pub fn get_incoming_requests<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    let requests = graph.relationships().list_incoming_requests(&user_id)?;
    Ok(json_response(200, &requests))
}

pub fn get_sent_requests<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    let requests = graph.relationships().list_sent_requests(&user_id)?;
    Ok(json_response(200, &requests))
}

pub fn get_followings_list<S: KeyValue>(graph: &SocialGraph<S>, path: &str) -> anyhow::Result<Response> {
    let user_id = match path_user_id(path, "/followings/") {
        Some(uid) => uid,
        None => return Ok(ApiError::BadRequest("User ID required".to_string()).into()),
    };
    let followings = graph.relationships().list_following(&user_id)?;
    Ok(json_response(200, &followings))
}

pub fn get_followers_list<S: KeyValue>(graph: &SocialGraph<S>, path: &str) -> anyhow::Result<Response> {
    let user_id = match path_user_id(path, "/followers/") {
        Some(uid) => uid,
        None => return Ok(ApiError::BadRequest("User ID required".to_string()).into()),
    };
    let followers = graph.relationships().list_followers(&user_id)?;
    Ok(json_response(200, &followers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kv::MemoryStore;
    use crate::events::EventBus;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording_bus() -> (EventBus, Arc<Mutex<Vec<&'static str>>>) {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(move |e| sink.lock().push(e.name()));
        (bus, seen)
    }

    fn id(s: &str) -> UserId {
        UserId::from(s)
    }

    #[test]
    fn follow_is_directed_and_deduplicated() {
        let kv = MemoryStore::new();
        let (bus, seen) = recording_bus();
        let store = RelationshipStore::new(&kv, &bus);

        assert_eq!(store.follow(&id("x"), &id("y")).unwrap(), Outcome::Created);
        assert_eq!(store.follow(&id("x"), &id("y")).unwrap(), Outcome::AlreadyExists);

        assert!(store.is_following(&id("x"), &id("y")).unwrap());
        assert!(!store.is_following(&id("y"), &id("x")).unwrap());
        assert_eq!(store.list_followers(&id("y")).unwrap().len(), 1);
        assert_eq!(*seen.lock(), vec!["follow"]);
    }

    #[test]
    fn self_follow_is_rejected() {
        let kv = MemoryStore::new();
        let bus = EventBus::new();
        let store = RelationshipStore::new(&kv, &bus);

        assert_eq!(store.follow(&id("x"), &id("x")).unwrap(), Outcome::InvalidPair);
        assert_eq!(store.request_follow(&id("x"), &id("x")).unwrap(), Outcome::InvalidPair);
        assert!(store.list_following(&id("x")).unwrap().is_empty());
    }

    #[test]
    fn unfollow_without_edge_emits_nothing() {
        let kv = MemoryStore::new();
        let (bus, seen) = recording_bus();
        let store = RelationshipStore::new(&kv, &bus);

        assert_eq!(store.unfollow(&id("x"), &id("y")).unwrap(), Outcome::NotFound);
        assert!(seen.lock().is_empty());

        store.follow(&id("x"), &id("y")).unwrap();
        assert_eq!(store.unfollow(&id("x"), &id("y")).unwrap(), Outcome::Removed);
        assert_eq!(*seen.lock(), vec!["follow", "unfollow"]);
    }

    #[test]
    fn request_then_accept_becomes_edge() {
        let kv = MemoryStore::new();
        let (bus, seen) = recording_bus();
        let store = RelationshipStore::new(&kv, &bus);

        assert_eq!(store.request_follow(&id("bob"), &id("alice")).unwrap(), Outcome::Created);
        assert_eq!(store.request_follow(&id("bob"), &id("alice")).unwrap(), Outcome::AlreadyExists);
        assert_eq!(store.accept_request(&id("bob"), &id("alice")).unwrap(), Outcome::Created);

        assert!(store.list_incoming_requests(&id("alice")).unwrap().is_empty());
        assert!(store.is_following(&id("bob"), &id("alice")).unwrap());
        assert_eq!(*seen.lock(), vec!["follow_request", "follow", "follow_accept"]);
    }

    #[test]
    fn accept_without_request_is_silent() {
        let kv = MemoryStore::new();
        let (bus, seen) = recording_bus();
        let store = RelationshipStore::new(&kv, &bus);

        assert_eq!(store.accept_request(&id("bob"), &id("alice")).unwrap(), Outcome::NotFound);
        assert!(!store.is_following(&id("bob"), &id("alice")).unwrap());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn decline_only_emits_when_something_was_pending() {
        let kv = MemoryStore::new();
        let (bus, seen) = recording_bus();
        let store = RelationshipStore::new(&kv, &bus);

        assert_eq!(store.decline_request(&id("bob"), &id("alice")).unwrap(), Outcome::NotFound);
        store.request_follow(&id("bob"), &id("alice")).unwrap();
        assert_eq!(store.decline_request(&id("bob"), &id("alice")).unwrap(), Outcome::Removed);

        assert!(!store.is_following(&id("bob"), &id("alice")).unwrap());
        assert!(store.list_sent_requests(&id("bob")).unwrap().is_empty());
        assert_eq!(*seen.lock(), vec!["follow_request", "follow_decline"]);
    }

    #[test]
    fn request_is_refused_once_following() {
        let kv = MemoryStore::new();
        let bus = EventBus::new();
        let store = RelationshipStore::new(&kv, &bus);

        store.follow(&id("bob"), &id("carol")).unwrap();
        assert_eq!(
            store.request_follow(&id("bob"), &id("carol")).unwrap(),
            Outcome::AlreadyExists
        );
    }

    #[test]
    fn direct_follow_clears_stale_request() {
        let kv = MemoryStore::new();
        let bus = EventBus::new();
        let store = RelationshipStore::new(&kv, &bus);

        store.request_follow(&id("bob"), &id("alice")).unwrap();
        store.follow(&id("bob"), &id("alice")).unwrap();
        assert!(!store.has_pending_request(&id("bob"), &id("alice")).unwrap());
    }

    #[test]
    fn counts_track_both_sides() {
        let kv = MemoryStore::new();
        let bus = EventBus::new();
        let store = RelationshipStore::new(&kv, &bus);

        store.follow(&id("a"), &id("b")).unwrap();
        store.follow(&id("c"), &id("b")).unwrap();
        store.follow(&id("b"), &id("a")).unwrap();

        let counts = store.counts(&id("b")).unwrap();
        assert_eq!(counts.followers, 2);
        assert_eq!(counts.following, 1);
    }

    #[test]
    fn accept_over_existing_edge_reports_request_cleanup() {
        let kv = MemoryStore::new();
        let legacy_row = serde_json::json!([
            { "followerId": "bob", "followingId": "alice", "createdAt": 1700000000000i64 }
        ]);
        kv.write_json(crate::config::FOLLOW_EDGES_KEY, &legacy_row).unwrap();
        kv.write_json(crate::config::FOLLOW_REQUESTS_KEY, &legacy_row).unwrap();
        let (bus, seen) = recording_bus();
        let store = RelationshipStore::new(&kv, &bus);

        assert_eq!(store.accept_request(&id("bob"), &id("alice")).unwrap(), Outcome::Removed);
        assert!(!store.has_pending_request(&id("bob"), &id("alice")).unwrap());
        assert_eq!(store.list_followers(&id("alice")).unwrap().len(), 1);
        assert_eq!(*seen.lock(), vec!["follow_accept"]);
    }

    #[test]
    fn cancel_withdraws_own_request() {
        let kv = MemoryStore::new();
        let (bus, seen) = recording_bus();
        let store = RelationshipStore::new(&kv, &bus);

        store.request_follow(&id("bob"), &id("alice")).unwrap();
        assert_eq!(store.cancel_request(&id("bob"), &id("alice")).unwrap(), Outcome::Removed);
        assert!(store.list_sent_requests(&id("bob")).unwrap().is_empty());
        assert!(store.list_incoming_requests(&id("alice")).unwrap().is_empty());
        assert_eq!(store.cancel_request(&id("bob"), &id("alice")).unwrap(), Outcome::NotFound);
        assert_eq!(*seen.lock(), vec!["follow_request", "follow_decline"]);
    }
}
