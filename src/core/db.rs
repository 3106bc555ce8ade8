use tracing::info;

use crate::config::ALL_TABLE_KEYS;
use crate::core::kv::KeyValue;
use crate::core::table;
use crate::graph::SocialGraph;
use crate::models::models::UserId;

/// Seeds a small demo network. Does nothing once any post exists.
///
/// alice is private with a pending request from bob; bob and carol follow
/// each other; dave has asked carol for messaging.
pub fn seed_demo_data<S: KeyValue>(graph: &SocialGraph<S>) -> anyhow::Result<()> {
    if !graph.posts().all()?.is_empty() {
        return Ok(()); // Already initialized
    }

    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    let carol = UserId::from("carol");
    let dave = UserId::from("dave");

    graph.visibility().set(&alice, true)?;

    graph.follow_or_request(&bob, &carol)?;
    graph.follow_or_request(&carol, &bob)?;
    graph.follow_or_request(&bob, &alice)?;
    graph.follow_or_request(&dave, &carol)?;
    graph.request_message(&dave, &carol)?;

    let posts = graph.posts();
    posts.create(&alice, "Sunrise loop around the lake, 42 km.")?;
    posts.create(&bob, "New chain, new me. Anyone up for Saturday?")?;
    posts.create(&carol, "Hill repeats done. Legs are gone.")?;
    posts.create(&carol, "Looking for a riding group near the coast.")?;

    info!("Seeded demo riders alice, bob, carol and dave");
    Ok(())
}

pub fn reset_graph_data<S: KeyValue>(kv: &S) -> anyhow::Result<()> {
    for key in ALL_TABLE_KEYS {
        table::clear(kv, key)?;
    }
    info!("Cleared {} graph tables", ALL_TABLE_KEYS.len());
    Ok(())
}
