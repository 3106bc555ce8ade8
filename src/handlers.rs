use spin_sdk::http::{Request, Response};
use tracing::error;

use crate::core::errors::ApiError;
use crate::core::kv::KeyValue;
use crate::graph::SocialGraph;
use crate::{follow, messages, notifications, posts, visibility};

/// Routes one request. Shared by the Spin component and the native server.
///
/// Handler failures are logged and answered with a 500 body.
pub fn route<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let method = req.method().to_string();
    let path = req.path().to_string();

    match dispatch(graph, req, &method, &path) {
        Ok(resp) => Ok(resp),
        Err(err) => {
            error!(%method, %path, error = %err, "Request failed");
            Ok(ApiError::from(err).into())
        }
    }
}

fn dispatch<S: KeyValue>(
    graph: &SocialGraph<S>,
    req: Request,
    method: &str,
    path: &str,
) -> anyhow::Result<Response> {
    match (method, path) {
        ("POST", "/follow") => follow::handle_follow(graph, req),
        ("POST", "/unfollow") => follow::handle_unfollow(graph, req),
        ("POST", "/follow-requests/accept") => follow::handle_request_action(graph, req, "accept"),
        ("POST", "/follow-requests/decline") => follow::handle_request_action(graph, req, "decline"),
        ("POST", "/follow-requests/cancel") => follow::handle_request_action(graph, req, "cancel"),
        ("GET", "/follow-requests/incoming") => follow::get_incoming_requests(graph, req),
        ("GET", "/follow-requests/sent") => follow::get_sent_requests(graph, req),
        ("GET", p) if p.starts_with("/followings/") => follow::get_followings_list(graph, p),
        ("GET", p) if p.starts_with("/followers/") => follow::get_followers_list(graph, p),

        ("POST", "/messages/request") => messages::handle_message_request(graph, req),
        ("POST", "/messages/accept") => messages::handle_message_answer(graph, req, true),
        ("POST", "/messages/decline") => messages::handle_message_answer(graph, req, false),
        ("GET", "/messages/incoming") => messages::get_incoming(graph, req),
        ("GET", "/messages/sent") => messages::get_sent(graph, req),
        ("GET", p) if p.starts_with("/messages/can/") => messages::get_can_message(graph, req),

        ("GET", p) if p.starts_with("/settings/") => visibility::get_settings(graph, p),
        ("PUT", "/settings") => visibility::update_settings(graph, req),
        ("GET", p) if p.starts_with("/profile/") => visibility::get_profile(graph, req),

        ("GET", "/notifications") => notifications::get_notifications(graph, req),
        ("POST", "/notifications/read") => notifications::mark_notifications_read(graph, req),

        ("POST", "/posts") => posts::create_post(graph, req),
        ("GET", "/feed") => posts::get_feed(graph, req),

        _ => Ok(ApiError::NotFound("No route found".to_string()).into()),
    }
}
