use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque account identifier.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        UserId(id)
    }
}

/// A pair is usable for an edge or request only when both sides are set and distinct.
pub fn is_valid_pair(a: &UserId, b: &UserId) -> bool {
    !a.is_empty() && !b.is_empty() && a != b
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FollowEdge {
    #[serde(alias = "followerId")]
    pub follower: UserId,
    #[serde(alias = "followingId")]
    pub following: UserId,
    #[serde(alias = "createdAt", deserialize_with = "timestamp::flexible")]
    pub created_at: DateTime<Utc>,
}

impl FollowEdge {
    pub fn matches(&self, follower: &UserId, following: &UserId) -> bool {
        &self.follower == follower && &self.following == following
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FollowRequest {
    #[serde(alias = "followerId")]
    pub follower: UserId,
    #[serde(alias = "followingId")]
    pub following: UserId,
    #[serde(alias = "createdAt", deserialize_with = "timestamp::flexible")]
    pub created_at: DateTime<Utc>,
}

impl FollowRequest {
    pub fn matches(&self, follower: &UserId, following: &UserId) -> bool {
        &self.follower == follower && &self.following == following
    }
}

/// Undirected permission to message. Built with `a <= b`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MessageEdge {
    pub a: UserId,
    pub b: UserId,
    #[serde(alias = "createdAt", deserialize_with = "timestamp::flexible")]
    pub created_at: DateTime<Utc>,
}

impl MessageEdge {
    pub fn new(x: &UserId, y: &UserId, created_at: DateTime<Utc>) -> Self {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        MessageEdge {
            a: a.clone(),
            b: b.clone(),
            created_at,
        }
    }

    /// Order-independent; rows written by older clients may not be normalized.
    pub fn connects(&self, x: &UserId, y: &UserId) -> bool {
        (&self.a == x && &self.b == y) || (&self.a == y && &self.b == x)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MessageRequest {
    #[serde(alias = "fromId")]
    pub from: UserId,
    #[serde(alias = "toId")]
    pub to: UserId,
    #[serde(alias = "createdAt", deserialize_with = "timestamp::flexible")]
    pub created_at: DateTime<Utc>,
}

impl MessageRequest {
    pub fn matches(&self, from: &UserId, to: &UserId) -> bool {
        &self.from == from && &self.to == to
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VisibilityPolicy {
    #[serde(alias = "userId")]
    pub user_id: UserId,
    #[serde(alias = "isPrivate", default)]
    pub is_private: bool,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Follow,
    FollowRequest,
    MessageRequest,
    Generic,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub id: String,
    #[serde(alias = "userId")]
    pub user_id: UserId,
    #[serde(alias = "type")]
    pub kind: NotificationKind,
    pub message: String,
    #[serde(alias = "createdAt", deserialize_with = "timestamp::flexible")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub from: Option<UserId>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FollowCounts {
    pub followers: usize,
    pub following: usize,
}

/// Accepts RFC 3339 strings and the epoch-millisecond numbers older clients wrote.
mod timestamp {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    pub fn flexible<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}", ms))),
            Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(D::Error::custom),
        }
    }
}
