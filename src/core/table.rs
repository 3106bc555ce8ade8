//! Versioned tables.
//!
//! Each entity collection lives under one key as
//! `{"schema_version": N, "rows": [...]}` and is rewritten in full on every
//! save. A bare JSON value under the key is the pre-envelope layout (schema
//! 0); it is decoded through [`TableRow::from_legacy`] and upgraded on the
//! next save.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::config::*;
use crate::core::errors::{GraphError, GraphResult};
use crate::core::kv::KeyValue;
use crate::models::models::*;

pub const SCHEMA_VERSION: u32 = 1;

pub trait TableRow: Serialize + DeserializeOwned {
    const KEY: &'static str;

    fn from_legacy(value: Value) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    rows: Vec<T>,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    schema_version: u32,
    rows: &'a [T],
}

pub fn load<R: TableRow, S: KeyValue>(kv: &S) -> GraphResult<Vec<R>> {
    match kv.read_json::<Value>(R::KEY)? {
        Some(raw) => decode(raw),
        None => Ok(Vec::new()),
    }
}

pub fn save<R: TableRow, S: KeyValue>(kv: &S, rows: &[R]) -> GraphResult<()> {
    let envelope = EnvelopeRef {
        schema_version: SCHEMA_VERSION,
        rows,
    };
    kv.write_json(R::KEY, &envelope)?;
    Ok(())
}

pub fn clear<S: KeyValue>(kv: &S, key: &str) -> GraphResult<()> {
    kv.remove(key)?;
    Ok(())
}

fn decode<R: TableRow>(raw: Value) -> GraphResult<Vec<R>> {
    let corrupt = |source| GraphError::Corrupt { key: R::KEY, source };

    let version = match &raw {
        Value::Object(map) => map.get("schema_version").and_then(Value::as_u64),
        _ => None,
    };

    match version {
        Some(found) if found > u64::from(SCHEMA_VERSION) => Err(GraphError::UnsupportedSchema {
            key: R::KEY,
            found,
            supported: SCHEMA_VERSION,
        }),
        Some(_) => {
            let envelope: Envelope<R> = serde_json::from_value(raw).map_err(corrupt)?;
            Ok(envelope.rows)
        }
        None => {
            warn!(key = R::KEY, "Legacy table layout detected, migrating on next write");
            R::from_legacy(raw).map_err(corrupt)
        }
    }
}

impl TableRow for FollowEdge {
    const KEY: &'static str = FOLLOW_EDGES_KEY;
}

impl TableRow for FollowRequest {
    const KEY: &'static str = FOLLOW_REQUESTS_KEY;
}

impl TableRow for MessageEdge {
    const KEY: &'static str = MESSAGE_EDGES_KEY;
}

impl TableRow for MessageRequest {
    const KEY: &'static str = MESSAGE_REQUESTS_KEY;
}

impl TableRow for VisibilityPolicy {
    const KEY: &'static str = USER_SETTINGS_KEY;

    /// Older clients kept settings as a `{ userId: { isPrivate } }` map.
    fn from_legacy(value: Value) -> Result<Vec<Self>, serde_json::Error> {
        match value {
            Value::Object(map) => map
                .into_iter()
                .map(|(user_id, settings)| {
                    Ok(VisibilityPolicy {
                        user_id: UserId::from(user_id),
                        is_private: settings["isPrivate"].as_bool().unwrap_or(false),
                    })
                })
                .collect(),
            other => serde_json::from_value(other),
        }
    }
}

impl TableRow for Notification {
    const KEY: &'static str = NOTIFICATIONS_KEY;
}

impl TableRow for Post {
    const KEY: &'static str = POSTS_KEY;
}
