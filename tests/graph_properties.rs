use std::sync::Arc;

use parking_lot::Mutex;
use pedal::{EventKind, GraphEvent, GraphPolicy, MemoryStore, Outcome, SocialGraph, UserId};
use proptest::prelude::*;

fn graph() -> SocialGraph<MemoryStore> {
    SocialGraph::new(MemoryStore::new(), GraphPolicy::default())
}

fn id(s: &str) -> UserId {
    UserId::from(s)
}

fn record_kinds(graph: &SocialGraph<MemoryStore>) -> Arc<Mutex<Vec<EventKind>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    graph.events().subscribe(move |event| {
        if let Some(kind) = event.kind() {
            sink.lock().push(kind);
        }
    });
    seen
}

#[test]
fn private_account_request_is_accepted() {
    let g = graph();
    g.visibility().set(&id("alice"), true).unwrap();

    g.relationships().request_follow(&id("bob"), &id("alice")).unwrap();
    let incoming = g.relationships().list_incoming_requests(&id("alice")).unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].follower, id("bob"));
    assert_eq!(incoming[0].following, id("alice"));

    assert_eq!(
        g.relationships().accept_request(&id("bob"), &id("alice")).unwrap(),
        Outcome::Created
    );
    assert!(g.relationships().list_incoming_requests(&id("alice")).unwrap().is_empty());
    assert!(g.relationships().list_following(&id("bob")).unwrap().contains(&id("alice")));
}

#[test]
fn declined_request_leaves_no_edge() {
    let g = graph();
    g.relationships().request_follow(&id("x"), &id("y")).unwrap();
    g.relationships().decline_request(&id("x"), &id("y")).unwrap();

    assert!(g.relationships().list_sent_requests(&id("x")).unwrap().is_empty());
    assert!(!g.relationships().is_following(&id("x"), &id("y")).unwrap());
}

#[test]
fn double_follow_stores_one_edge() {
    let g = graph();
    g.follow(&id("x"), &id("y")).unwrap();
    g.follow(&id("x"), &id("y")).unwrap();
    assert_eq!(g.relationships().list_followers(&id("y")).unwrap().len(), 1);
    assert_eq!(g.relationships().counts(&id("x")).unwrap().following, 1);
}

#[test]
fn message_request_without_follow_is_allowed_by_default() {
    let g = graph();
    assert_eq!(g.request_message(&id("carol"), &id("dave")).unwrap(), Outcome::Created);
    assert_eq!(g.messages().list_incoming(&id("dave")).unwrap().len(), 1);
}

#[test]
fn message_request_without_follow_is_refused_when_required() {
    let g = SocialGraph::new(
        MemoryStore::new(),
        GraphPolicy {
            message_requires_follow: true,
            ..GraphPolicy::default()
        },
    );
    assert_eq!(g.request_message(&id("carol"), &id("dave")).unwrap(), Outcome::NotAllowed);
    assert!(g.messages().list_incoming(&id("dave")).unwrap().is_empty());

    g.follow(&id("carol"), &id("dave")).unwrap();
    assert_eq!(g.request_message(&id("carol"), &id("dave")).unwrap(), Outcome::Created);
}

#[test]
fn events_fire_only_on_state_changes() {
    let g = graph();
    let seen = record_kinds(&g);

    g.unfollow(&id("x"), &id("y")).unwrap();
    g.relationships().decline_request(&id("x"), &id("y")).unwrap();
    g.messages().decline_message(&id("x"), &id("y")).unwrap();
    assert!(seen.lock().is_empty());

    g.follow(&id("x"), &id("y")).unwrap();
    g.follow(&id("x"), &id("y")).unwrap();
    g.unfollow(&id("x"), &id("y")).unwrap();
    g.request_message(&id("x"), &id("y")).unwrap();
    g.messages().accept_message(&id("x"), &id("y")).unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            EventKind::Follow,
            EventKind::Unfollow,
            EventKind::MsgRequest,
            EventKind::MsgAccept
        ]
    );
}

#[test]
fn listeners_see_visibility_changes() {
    let g = graph();
    let flags = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&flags);
    let sub = g.events().subscribe(move |event| {
        if let GraphEvent::VisibilityChanged { user, is_private, .. } = event {
            sink.lock().push((user.clone(), *is_private));
        }
    });

    g.visibility().set(&id("alice"), true).unwrap();
    assert!(g.events().unsubscribe(sub));
    g.visibility().set(&id("alice"), false).unwrap();

    assert_eq!(*flags.lock(), vec![(id("alice"), true)]);
}

#[test]
fn state_survives_a_file_store_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let g = SocialGraph::new(pedal::FileStore::open(dir.path()).unwrap(), GraphPolicy::default());
        g.follow(&id("bob"), &id("carol")).unwrap();
        g.messages().accept_message(&id("bob"), &id("carol")).unwrap();
    }
    let g = SocialGraph::new(pedal::FileStore::open(dir.path()).unwrap(), GraphPolicy::default());
    assert!(g.relationships().is_following(&id("bob"), &id("carol")).unwrap());
    assert!(g.messages().can_message(&id("carol"), &id("bob")).unwrap());
}

fn user() -> impl Strategy<Value = UserId> {
    "[a-e]{1,2}".prop_map(UserId::from)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn follow_is_asymmetric(x in user(), y in user()) {
        prop_assume!(x != y);
        let g = graph();
        let reverse_before = g.relationships().is_following(&y, &x).unwrap();
        g.follow(&x, &y).unwrap();
        prop_assert!(g.relationships().is_following(&x, &y).unwrap());
        prop_assert_eq!(g.relationships().is_following(&y, &x).unwrap(), reverse_before);
    }

    #[test]
    fn self_follow_never_creates_an_edge(x in user()) {
        let g = graph();
        prop_assert_eq!(g.follow(&x, &x).unwrap(), Outcome::InvalidPair);
        prop_assert!(!g.relationships().is_following(&x, &x).unwrap());
    }

    #[test]
    fn follow_unfollow_follow_matches_single_follow(x in user(), y in user()) {
        prop_assume!(x != y);
        let round_trip = graph();
        round_trip.follow(&x, &y).unwrap();
        round_trip.unfollow(&x, &y).unwrap();
        round_trip.follow(&x, &y).unwrap();

        let single = graph();
        single.follow(&x, &y).unwrap();

        prop_assert_eq!(
            round_trip.relationships().list_following(&x).unwrap(),
            single.relationships().list_following(&x).unwrap()
        );
        prop_assert_eq!(
            round_trip.relationships().list_followers(&y).unwrap(),
            single.relationships().list_followers(&y).unwrap()
        );
    }

    #[test]
    fn can_message_is_symmetric(
        grants in proptest::collection::vec((user(), user()), 0..6),
        a in user(),
        b in user(),
    ) {
        let g = graph();
        for (from, to) in &grants {
            g.request_message(from, to).unwrap();
            g.messages().accept_message(from, to).unwrap();
        }
        prop_assert_eq!(
            g.messages().can_message(&a, &b).unwrap(),
            g.messages().can_message(&b, &a).unwrap()
        );
    }

    #[test]
    fn edge_and_request_never_coexist(
        ops in proptest::collection::vec((0u8..5, user(), user()), 0..20),
    ) {
        let g = graph();
        let rel = g.relationships();
        for (op, x, y) in &ops {
            match op {
                0 => { rel.follow(x, y).unwrap(); }
                1 => { rel.unfollow(x, y).unwrap(); }
                2 => { rel.request_follow(x, y).unwrap(); }
                3 => { rel.accept_request(x, y).unwrap(); }
                _ => { rel.decline_request(x, y).unwrap(); }
            }
        }
        for (_, x, y) in &ops {
            let both = rel.is_following(x, y).unwrap() && rel.has_pending_request(x, y).unwrap();
            prop_assert!(!both);
        }
    }
}
