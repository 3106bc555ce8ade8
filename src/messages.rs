use spin_sdk::http::{Request, Response};
use tracing::debug;

use crate::core::errors::{ApiError, GraphResult, Outcome};
use crate::core::helpers::{acting_user, body_user_id, json_response, now, path_user_id};
use crate::core::kv::KeyValue;
use crate::core::table;
use crate::events::{EventKind, EventSink, GraphEvent};
use crate::graph::SocialGraph;
use crate::models::models::{is_valid_pair, MessageEdge, MessageRequest, UserId};

/// Undirected messaging permissions and the requests that precede them.
pub struct MessageStore<'a, S> {
    kv: &'a S,
    events: &'a dyn EventSink,
}

impl<'a, S: KeyValue> MessageStore<'a, S> {
    pub fn new(kv: &'a S, events: &'a dyn EventSink) -> Self {
        MessageStore { kv, events }
    }

    fn edges(&self) -> GraphResult<Vec<MessageEdge>> {
        table::load(self.kv)
    }

    fn requests(&self) -> GraphResult<Vec<MessageRequest>> {
        table::load(self.kv)
    }

    pub fn can_message(&self, a: &UserId, b: &UserId) -> GraphResult<bool> {
        if a == b {
            return Ok(true);
        }
        Ok(self.edges()?.iter().any(|e| e.connects(a, b)))
    }

    pub fn request_message(&self, from: &UserId, to: &UserId) -> GraphResult<Outcome> {
        if !is_valid_pair(from, to) {
            return Ok(Outcome::InvalidPair);
        }
        if self.can_message(from, to)? {
            return Ok(Outcome::AlreadyExists);
        }
        let mut requests = self.requests()?;
        if requests.iter().any(|r| r.matches(from, to)) {
            return Ok(Outcome::AlreadyExists);
        }
        requests.push(MessageRequest {
            from: from.clone(),
            to: to.clone(),
            created_at: now(),
        });
        table::save(self.kv, &requests)?;

        debug!(%from, %to, "Message request created");
        self.events
            .emit(GraphEvent::pair(EventKind::MsgRequest, from, to))?;
        Ok(Outcome::Created)
    }

    /// Grants the permission and clears pending requests in both directions.
    pub fn accept_message(&self, from: &UserId, to: &UserId) -> GraphResult<Outcome> {
        if !is_valid_pair(from, to) {
            return Ok(Outcome::InvalidPair);
        }
        let mut requests = self.requests()?;
        let before = requests.len();
        requests.retain(|r| !(r.matches(from, to) || r.matches(to, from)));
        let cleared = requests.len() != before;
        if cleared {
            table::save(self.kv, &requests)?;
        }

        let mut edges = self.edges()?;
        let created = !edges.iter().any(|e| e.connects(from, to));
        if created {
            edges.push(MessageEdge::new(from, to, now()));
            table::save(self.kv, &edges)?;
        }

        if !created && !cleared {
            return Ok(Outcome::AlreadyExists);
        }
        debug!(%from, %to, created, cleared, "Message request accepted");
        self.events
            .emit(GraphEvent::pair(EventKind::MsgAccept, from, to))?;
        Ok(if created { Outcome::Created } else { Outcome::Removed })
    }

    pub fn decline_message(&self, from: &UserId, to: &UserId) -> GraphResult<Outcome> {
        let mut requests = self.requests()?;
        let before = requests.len();
        requests.retain(|r| !r.matches(from, to));
        if requests.len() == before {
            return Ok(Outcome::NotFound);
        }
        table::save(self.kv, &requests)?;

        self.events
            .emit(GraphEvent::pair(EventKind::MsgDecline, from, to))?;
        Ok(Outcome::Removed)
    }

    /// Drops the permission for the pair. Only used by the unfollow cascade.
    pub fn revoke_message(&self, a: &UserId, b: &UserId) -> GraphResult<Outcome> {
        let mut edges = self.edges()?;
        let before = edges.len();
        edges.retain(|e| !e.connects(a, b));
        if edges.len() == before {
            return Ok(Outcome::NotFound);
        }
        table::save(self.kv, &edges)?;
        debug!(%a, %b, "Message permission revoked");
        Ok(Outcome::Removed)
    }

    pub fn list_incoming(&self, user: &UserId) -> GraphResult<Vec<MessageRequest>> {
        Ok(self
            .requests()?
            .into_iter()
            .filter(|r| &r.to == user)
            .collect())
    }

    pub fn list_sent(&self, user: &UserId) -> GraphResult<Vec<MessageRequest>> {
        Ok(self
            .requests()?
            .into_iter()
            .filter(|r| &r.from == user)
            .collect())
    }
}

// === HTTP Handlers ===

pub fn handle_message_request<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    let target = match body_user_id(&req, "target") {
        Ok(Some(t)) => t,
        Ok(None) => return Ok(ApiError::BadRequest("Invalid target user".to_string()).into()),
        Err(err) => return Ok(err.into()),
    };

    let outcome = graph.request_message(&user_id, &target)?;
    Ok(json_response(outcome.http_status(), &serde_json::json!({ "status": outcome })))
}

/// The acting user answers a request sent by `from`.
pub fn handle_message_answer<S: KeyValue>(
    graph: &SocialGraph<S>,
    req: Request,
    accept: bool,
) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    let from = match body_user_id(&req, "from") {
        Ok(Some(f)) => f,
        Ok(None) => return Ok(ApiError::BadRequest("from is required".to_string()).into()),
        Err(err) => return Ok(err.into()),
    };

    let messages = graph.messages();
    let outcome = if accept {
        messages.accept_message(&from, &user_id)?
    } else {
        messages.decline_message(&from, &user_id)?
    };
    Ok(json_response(outcome.http_status(), &serde_json::json!({ "status": outcome })))
}

pub fn get_incoming<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    Ok(json_response(200, &graph.messages().list_incoming(&user_id)?))
}

pub fn get_sent<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    Ok(json_response(200, &graph.messages().list_sent(&user_id)?))
}

pub fn get_can_message<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    let other = match path_user_id(req.path(), "/messages/can/") {
        Some(o) => o,
        None => return Ok(ApiError::BadRequest("User ID required".to_string()).into()),
    };
    let allowed = graph.messages().can_message(&user_id, &other)?;
    Ok(json_response(200, &serde_json::json!({ "user": other, "can_message": allowed })))
}
