use spin_sdk::http::{Request, Response};
use tracing::debug;

use crate::core::errors::{ApiError, GraphResult, Outcome};
use crate::core::helpers::{acting_user, json_body, json_response, now, path_user_id};
use crate::core::kv::KeyValue;
use crate::core::table;
use crate::events::{EventSink, GraphEvent};
use crate::graph::SocialGraph;
use crate::models::models::{UserId, VisibilityPolicy};

/// Per-user privacy flag. Users never set are public.
pub struct VisibilityStore<'a, S> {
    kv: &'a S,
    events: &'a dyn EventSink,
}

impl<'a, S: KeyValue> VisibilityStore<'a, S> {
    pub fn new(kv: &'a S, events: &'a dyn EventSink) -> Self {
        VisibilityStore { kv, events }
    }

    pub fn get(&self, user: &UserId) -> GraphResult<VisibilityPolicy> {
        let rows: Vec<VisibilityPolicy> = table::load(self.kv)?;
        Ok(rows
            .into_iter()
            .find(|p| &p.user_id == user)
            .unwrap_or_else(|| VisibilityPolicy {
                user_id: user.clone(),
                is_private: false,
            }))
    }

    pub fn is_private(&self, user: &UserId) -> GraphResult<bool> {
        Ok(self.get(user)?.is_private)
    }

    /// `InvalidPair` for an empty id, `AlreadyExists` when the flag is unchanged.
    pub fn set(&self, user: &UserId, is_private: bool) -> GraphResult<Outcome> {
        if user.is_empty() {
            return Ok(Outcome::InvalidPair);
        }
        let mut rows: Vec<VisibilityPolicy> = table::load(self.kv)?;
        let outcome = match rows.iter_mut().find(|p| &p.user_id == user) {
            Some(row) if row.is_private == is_private => return Ok(Outcome::AlreadyExists),
            Some(row) => {
                row.is_private = is_private;
                Outcome::Updated
            }
            None => {
                rows.push(VisibilityPolicy {
                    user_id: user.clone(),
                    is_private,
                });
                Outcome::Created
            }
        };
        table::save(self.kv, &rows)?;

        debug!(%user, is_private, "Visibility changed");
        self.events.emit(GraphEvent::VisibilityChanged {
            user: user.clone(),
            is_private,
            at: now(),
        })?;
        Ok(outcome)
    }
}

// === HTTP Handlers ===

pub fn get_settings<S: KeyValue>(graph: &SocialGraph<S>, path: &str) -> anyhow::Result<Response> {
    let user_id = match path_user_id(path, "/settings/") {
        Some(uid) => uid,
        None => return Ok(ApiError::BadRequest("User ID required".to_string()).into()),
    };
    Ok(json_response(200, &graph.visibility().get(&user_id)?))
}

pub fn update_settings<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    let value = match json_body(&req) {
        Ok(value) => value,
        Err(err) => return Ok(err.into()),
    };
    let is_private = match value["is_private"].as_bool() {
        Some(flag) => flag,
        None => return Ok(ApiError::BadRequest("is_private must be a boolean".to_string()).into()),
    };

    let outcome = graph.visibility().set(&user_id, is_private)?;
    let status = if outcome == Outcome::AlreadyExists { 200 } else { outcome.http_status() };
    Ok(json_response(
        status,
        &serde_json::json!({ "status": outcome, "user_id": user_id, "is_private": is_private }),
    ))
}

/// Profile summary; posts are included only when the viewer passes the privacy gate.
pub fn get_profile<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let owner = match path_user_id(req.path(), "/profile/") {
        Some(uid) => uid,
        None => return Ok(ApiError::BadRequest("User ID required".to_string()).into()),
    };
    let viewer = acting_user(&req);

    let relationships = graph.relationships();
    let counts = relationships.counts(&owner)?;
    let is_private = graph.visibility().is_private(&owner)?;
    let can_view = graph.can_view_profile(viewer.as_ref(), &owner)?;
    let (is_following, requested) = match &viewer {
        Some(v) => (
            relationships.is_following(v, &owner)?,
            relationships.has_pending_request(v, &owner)?,
        ),
        None => (false, false),
    };

    let mut body = serde_json::json!({
        "user_id": owner,
        "is_private": is_private,
        "followers": counts.followers,
        "following": counts.following,
        "can_view": can_view,
        "is_following": is_following,
        "requested": requested,
    });
    if can_view {
        body["posts"] = serde_json::to_value(graph.posts().by_author(&owner)?)?;
    }
    Ok(json_response(200, &body))
}
