use spin_sdk::http::{Request, Response};
use uuid::Uuid;

use crate::core::errors::{ApiError, GraphResult};
use crate::core::helpers::{acting_user, json_response, now};
use crate::core::kv::KeyValue;
use crate::core::table;
use crate::events::{EventKind, GraphEvent};
use crate::graph::SocialGraph;
use crate::models::models::{Notification, NotificationKind, UserId};

/// Persisted per-recipient notifications.
pub struct NotificationInbox<'a, S> {
    kv: &'a S,
}

impl<'a, S: KeyValue> NotificationInbox<'a, S> {
    pub fn new(kv: &'a S) -> Self {
        NotificationInbox { kv }
    }

    pub fn add(
        &self,
        recipient: &UserId,
        kind: NotificationKind,
        message: impl Into<String>,
        from: Option<&UserId>,
    ) -> GraphResult<Notification> {
        let mut items: Vec<Notification> = table::load(self.kv)?;
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            user_id: recipient.clone(),
            kind,
            message: message.into(),
            created_at: now(),
            read: false,
            from: from.cloned(),
        };
        items.push(notification.clone());
        table::save(self.kv, &items)?;
        Ok(notification)
    }

    /// Newest first.
    pub fn list(&self, user: &UserId) -> GraphResult<Vec<Notification>> {
        let items: Vec<Notification> = table::load(self.kv)?;
        let mut mine: Vec<Notification> = items.into_iter().filter(|n| &n.user_id == user).collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }

    pub fn count_unread(&self, user: &UserId) -> GraphResult<usize> {
        let items: Vec<Notification> = table::load(self.kv)?;
        Ok(items.iter().filter(|n| &n.user_id == user && !n.read).count())
    }

    /// Returns how many items flipped to read.
    pub fn mark_all_read(&self, user: &UserId) -> GraphResult<usize> {
        let mut items: Vec<Notification> = table::load(self.kv)?;
        let mut changed = 0;
        for item in items.iter_mut().filter(|n| &n.user_id == user && !n.read) {
            item.read = true;
            changed += 1;
        }
        if changed > 0 {
            table::save(self.kv, &items)?;
        }
        Ok(changed)
    }

    /// Turns a graph event into an inbox item for the affected user, if it warrants one.
    pub fn record(&self, event: &GraphEvent) -> GraphResult<Option<Notification>> {
        let GraphEvent::Pair { kind, from, to, .. } = event else {
            return Ok(None);
        };
        let (recipient, kind, message) = match kind {
            EventKind::Follow => (to, NotificationKind::Follow, format!("{} started following you", from)),
            EventKind::FollowRequest => (
                to,
                NotificationKind::FollowRequest,
                format!("{} requested to follow you", from),
            ),
            EventKind::FollowAccept => (
                from,
                NotificationKind::Generic,
                format!("{} accepted your follow request", to),
            ),
            EventKind::MsgRequest => (
                to,
                NotificationKind::MessageRequest,
                format!("{} wants to message you", from),
            ),
            EventKind::MsgAccept => (
                from,
                NotificationKind::Generic,
                format!("{} accepted your message request", to),
            ),
            _ => return Ok(None),
        };
        let sender = if recipient == to { from } else { to };
        self.add(recipient, kind, message, Some(sender)).map(Some)
    }
}

// === HTTP Handlers ===

pub fn get_notifications<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    let inbox = graph.inbox();
    let items = inbox.list(&user_id)?;
    let unread = inbox.count_unread(&user_id)?;
    Ok(json_response(200, &serde_json::json!({ "unread": unread, "items": items })))
}

pub fn mark_notifications_read<S: KeyValue>(graph: &SocialGraph<S>, req: Request) -> anyhow::Result<Response> {
    let user_id = match acting_user(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    let marked = graph.inbox().mark_all_read(&user_id)?;
    Ok(json_response(200, &serde_json::json!({ "marked": marked })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kv::MemoryStore;

    #[test]
    fn unread_count_and_mark_all_read() {
        let kv = MemoryStore::new();
        let inbox = NotificationInbox::new(&kv);
        let alice = UserId::from("alice");

        inbox.add(&alice, NotificationKind::Generic, "one", None).unwrap();
        inbox.add(&alice, NotificationKind::Generic, "two", None).unwrap();
        inbox.add(&"bob".into(), NotificationKind::Generic, "other", None).unwrap();

        assert_eq!(inbox.count_unread(&alice).unwrap(), 2);
        assert_eq!(inbox.mark_all_read(&alice).unwrap(), 2);
        assert_eq!(inbox.mark_all_read(&alice).unwrap(), 0);
        assert_eq!(inbox.count_unread(&alice).unwrap(), 0);
        assert_eq!(inbox.count_unread(&"bob".into()).unwrap(), 1);
    }

    #[test]
    fn follow_request_notifies_the_target() {
        let kv = MemoryStore::new();
        let inbox = NotificationInbox::new(&kv);
        let event = GraphEvent::pair(EventKind::FollowRequest, &"bob".into(), &"alice".into());

        let note = inbox.record(&event).unwrap().unwrap();
        assert_eq!(note.user_id.as_str(), "alice");
        assert_eq!(note.kind, NotificationKind::FollowRequest);
        assert_eq!(note.from, Some(UserId::from("bob")));
        assert_eq!(note.message, "bob requested to follow you");
    }

    #[test]
    fn acceptance_notifies_the_requester() {
        let kv = MemoryStore::new();
        let inbox = NotificationInbox::new(&kv);
        let event = GraphEvent::pair(EventKind::FollowAccept, &"bob".into(), &"alice".into());

        let note = inbox.record(&event).unwrap().unwrap();
        assert_eq!(note.user_id.as_str(), "bob");
        assert_eq!(note.from, Some(UserId::from("alice")));
    }

    #[test]
    fn removals_are_not_recorded() {
        let kv = MemoryStore::new();
        let inbox = NotificationInbox::new(&kv);
        let event = GraphEvent::pair(EventKind::Unfollow, &"bob".into(), &"alice".into());
        assert!(inbox.record(&event).unwrap().is_none());
        assert!(inbox.list(&"alice".into()).unwrap().is_empty());
    }

    #[test]
    fn list_is_newest_first() {
        let kv = MemoryStore::new();
        let inbox = NotificationInbox::new(&kv);
        let alice = UserId::from("alice");
        let first = inbox.add(&alice, NotificationKind::Generic, "first", None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = inbox.add(&alice, NotificationKind::Generic, "second", None).unwrap();

        let items = inbox.list(&alice).unwrap();
        assert_eq!(items[0].id, second.id);
        assert_eq!(items[1].id, first.id);
    }
}
