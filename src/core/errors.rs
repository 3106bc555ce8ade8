use serde::Serialize;
use spin_sdk::http::Response;
use std::fmt;
use thiserror::Error;

use crate::core::helpers::json_response;

/// Storage faults. Graph-level no-ops are reported through [`Outcome`] instead.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Storage(#[from] anyhow::Error),

    #[error("table {key} is unreadable: {source}")]
    Corrupt {
        key: &'static str,
        source: serde_json::Error,
    },

    #[error("table {key} has schema version {found}, newest supported is {supported}")]
    UnsupportedSchema {
        key: &'static str,
        found: u64,
        supported: u32,
    },
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// What a graph operation did. None of these are failures from the caller's side.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Updated,
    Removed,
    AlreadyExists,
    NotFound,
    InvalidPair,
    NotAllowed,
}

impl Outcome {
    /// True when persisted state changed.
    pub fn changed(self) -> bool {
        matches!(self, Outcome::Created | Outcome::Updated | Outcome::Removed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Removed => "removed",
            Outcome::AlreadyExists => "already_exists",
            Outcome::NotFound => "not_found",
            Outcome::InvalidPair => "invalid_pair",
            Outcome::NotAllowed => "not_allowed",
        }
    }

    pub fn http_status(self) -> u16 {
        match self {
            Outcome::Created | Outcome::Updated | Outcome::Removed => 200,
            Outcome::AlreadyExists => 409,
            Outcome::NotFound => 404,
            Outcome::InvalidPair => 400,
            Outcome::NotAllowed => 403,
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    InternalError(String),
}

impl ApiError {
    fn status(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized => 401,
            ApiError::NotFound(_) => 404,
            ApiError::InternalError(_) => 500,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::InternalError(msg) => msg,
            ApiError::Unauthorized => "Unauthorized",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
        }
    }
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        json_response(err.status(), &serde_json::json!({ "error": err.message() }))
    }
}

impl std::error::Error for ApiError {}

// Implement conversion from anyhow::Error to ApiError for internal errors
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
