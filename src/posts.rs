use spin_sdk::http::{Request, Response};
use uuid::Uuid;

use crate::config::MAX_POST_LENGTH;
use crate::core::errors::{ApiError, GraphResult};
use crate::core::helpers::{acting_user, json_body, json_response, now, sanitize_text};
use crate::core::kv::KeyValue;
use crate::core::query_params::{get_int, parse_query_params};
use crate::core::table;
use crate::feed::paginate;
use crate::graph::SocialGraph;
use crate::models::models::{Post, UserId};

/// Local post table feeding the projection when no remote post API is wired in.
pub struct PostStore<'a, S> {
    kv: &'a S,
}

impl<'a, S: KeyValue> PostStore<'a, S> {
    pub fn new(kv: &'a S) -> Self {
        PostStore { kv }
    }

    pub fn create(&self, author: &UserId, content: &str) -> GraphResult<Post> {
        let mut posts: Vec<Post> = table::load(self.kv)?;
        let post = Post {
            id: Uuid::new_v4().to_string(),
            user_id: author.clone(),
            content: sanitize_text(content),
            created_at: now(),
            updated_at: None,
        };
        posts.insert(0, post.clone()); // prepend newest
        table::save(self.kv, &posts)?;
        Ok(post)
    }

    pub fn all(&self) -> GraphResult<Vec<Post>> {
        table::load(self.kv)
    }

    pub fn by_author(&self, author: &UserId) -> GraphResult<Vec<Post>> {
        Ok(self.all()?.into_iter().filter(|p| &p.user_id == author).collect())
    }
}

/// Checks what would actually be stored: markup-only input sanitizes to nothing.
/// Stored text is HTML-escaped, so the length limit counts entities like `&amp;`.
pub fn is_postable(content: &str) -> bool {
    let cleaned = sanitize_text(content);
    !cleaned.trim().is_empty() && cleaned.len() <= MAX_POST_LENGTH
}

// === HTTP Handlers ===

pub fn create_post<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let value = match json_body(&req) {
        Ok(value) => value,
        Err(err) => return Ok(err.into()),
    };
    let content = value["content"].as_str().unwrap_or_default();

    if !is_postable(content) {
        return Ok(ApiError::BadRequest("Invalid content".to_string()).into());
    }

    let post = graph.posts().create(&user_id, content)?;
    Ok(json_response(201, &post))
}

pub fn get_feed<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    let params = parse_query_params(&req.uri());
    let page = get_int(&params, "page", 1);

    let feed = paginate(graph.feed(&user_id)?, page);
    Ok(json_response(200, &serde_json::json!({ "page": page, "posts": feed })))
}
