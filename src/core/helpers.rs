use ammonia::Builder;
use chrono::{DateTime, Utc};
use serde::Serialize;
use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;

use crate::config::{MAX_USER_ID_LENGTH, USER_HEADER};
use crate::core::errors::ApiError;
use crate::models::models::UserId;

pub fn open_store() -> anyhow::Result<Store> {
    Store::open_default().map_err(|e| anyhow::anyhow!("Failed to open KV store: {}", e))
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn json_response<T: Serialize + ?Sized>(status: u16, body: &T) -> Response {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(body).unwrap_or_default())
        .build()
}

pub fn validate_user_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_USER_ID_LENGTH && !id.chars().any(char::is_whitespace)
}

pub fn parse_user_id(id: &str) -> Option<UserId> {
    validate_user_id(id).then(|| UserId::from(id))
}

/// Acting user, taken from the request header as supplied.
pub fn acting_user(req: &Request) -> Option<UserId> {
    let value = req.header(USER_HEADER)?.as_str()?;
    parse_user_id(value.trim())
}

/// JSON request body. An empty body reads as `null`; malformed JSON is a bad request.
pub fn json_body(req: &Request) -> Result<serde_json::Value, ApiError> {
    if req.body().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(req.body()).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}

/// Reads a user id field from a JSON body.
pub fn body_user_id(req: &Request, field: &str) -> Result<Option<UserId>, ApiError> {
    Ok(json_body(req)?[field].as_str().and_then(parse_user_id))
}

/// Path segment after `prefix`, validated as a user id.
pub fn path_user_id(path: &str, prefix: &str) -> Option<UserId> {
    let rest = path.strip_prefix(prefix)?;
    parse_user_id(rest.trim_end_matches('/'))
}

pub fn sanitize_text(text: &str) -> String {
    // Plain text only; every tag is stripped.
    Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_ids_reject_blank_and_whitespace() {
        assert!(validate_user_id("alice"));
        assert!(!validate_user_id(""));
        assert!(!validate_user_id("al ice"));
        assert!(!validate_user_id(&"x".repeat(MAX_USER_ID_LENGTH + 1)));
    }

    #[test]
    fn path_user_id_strips_prefix() {
        assert_eq!(
            path_user_id("/followers/bob", "/followers/"),
            Some(UserId::from("bob"))
        );
        assert_eq!(path_user_id("/followers/", "/followers/"), None);
        assert_eq!(path_user_id("/other/bob", "/followers/"), None);
    }

    #[test]
    fn sanitize_strips_markup() {
        assert_eq!(sanitize_text("<b>ride</b> on"), "ride on");
        assert_eq!(sanitize_text("<script>alert(1)</script>hi"), "hi");
    }
}
