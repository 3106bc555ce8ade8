//! Relationship core of the Pedal rider network: follows and follow
//! requests, message permissions, account visibility, change notifications
//! and the feed projection, served as a Spin HTTP component.

pub mod config;
pub mod core;
pub mod events;
pub mod feed;
pub mod follow;
pub mod graph;
pub mod handlers;
pub mod messages;
pub mod models;
pub mod notifications;
pub mod posts;
pub mod visibility;

pub use crate::core::errors::{GraphError, GraphResult, Outcome};
pub use crate::core::kv::{FileStore, KeyValue, MemoryStore};
pub use crate::events::{EventBus, EventKind, GraphEvent, SubscriptionId};
pub use crate::graph::{FollowRoute, GraphPolicy, SocialGraph};
pub use crate::models::models::UserId;

// === Component entrypoint ===
#[cfg(target_arch = "wasm32")]
mod component {
    use spin_sdk::http::{IntoResponse, Request};
    use spin_sdk::http_component;

    use crate::config;
    use crate::core::db::seed_demo_data;
    use crate::core::helpers::open_store;
    use crate::graph::{GraphPolicy, SocialGraph};
    use crate::handlers::route;

    #[http_component]
    fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
        let graph = SocialGraph::new(open_store()?, GraphPolicy::from_env());
        if config::seed_demo() {
            seed_demo_data(&graph)?;
        }
        route(&graph, req)
    }
}
