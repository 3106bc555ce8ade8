//! Aggregate feed projection.
//!
//! The feed is derived on every call from the post collection and the
//! viewer's follow edges; nothing about it is stored.

use std::collections::BTreeSet;

use crate::config::FEED_PAGE_SIZE;
use crate::models::models::{Post, UserId};

/// Posts by the viewer or anyone the viewer follows, newest first.
pub fn project_feed(posts: Vec<Post>, viewer: &UserId, following: &BTreeSet<UserId>) -> Vec<Post> {
    let mut visible: Vec<Post> = posts
        .into_iter()
        .filter(|p| &p.user_id == viewer || following.contains(&p.user_id))
        .collect();
    visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    visible
}

/// 1-based page of `FEED_PAGE_SIZE` posts; past the end is empty.
pub fn paginate(posts: Vec<Post>, page: usize) -> Vec<Post> {
    let start = page.saturating_sub(1).saturating_mul(FEED_PAGE_SIZE);
    posts.into_iter().skip(start).take(FEED_PAGE_SIZE).collect()
}
