//! End-to-end tests for the memory store: dedup, causation index, recency
//! windows, and news detection over generated message streams.

use std::collections::HashSet;
use std::sync::Arc;

use agent_memory::{ActionTag, MemoryStore, Message};

const ROLES: &[&str] = &["user", "assistant", "Alice", "Bob"];
const TAGS: &[Option<&str>] = &[None, Some("WriteCode"), Some("WritePRD"), Some("WriteTest")];

/// Deterministic pseudo-random stream (LCG) with plenty of repeats.
fn generate(seed: u64, n: usize) -> Vec<Message> {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as usize
    };
    (0..n)
        .map(|_| {
            let role = ROLES[next() % ROLES.len()];
            let content = format!("msg-{}", next() % 12);
            let m = Message::new(role, content);
            match TAGS[next() % TAGS.len()] {
                Some(tag) => m.caused_by(tag),
                None => m,
            }
        })
        .collect()
}

fn caused_subsequence(store: &MemoryStore, tag: &ActionTag) -> Vec<Arc<Message>> {
    store
        .get_recent(0)
        .into_iter()
        .filter(|m| m.cause_by() == Some(tag))
        .collect()
}

#[test]
fn test_count_equals_distinct_submissions() {
    for seed in [1, 7, 42, 1337] {
        let messages = generate(seed, 200);
        let distinct: HashSet<&Message> = messages.iter().collect();

        let mut store = MemoryStore::new();
        store.add_batch(messages.clone());
        assert_eq!(store.count(), distinct.len(), "seed {seed}");
    }
}

#[test]
fn test_buckets_mirror_log_subsequence() {
    let mut store = MemoryStore::new();
    store.add_batch(generate(99, 300));

    for tag in TAGS.iter().flatten().map(|t| ActionTag::from(*t)) {
        assert_eq!(store.get_by_action(&tag), caused_subsequence(&store, &tag));
    }
    store.check_consistency().unwrap();
}

#[test]
fn test_index_survives_interleaved_deletes() {
    let mut store = MemoryStore::new();
    let messages = generate(5, 150);
    store.add_batch(messages.clone());

    for (i, m) in messages.iter().enumerate() {
        if i % 3 == 0 {
            // duplicates in the stream may already be gone
            let _ = store.delete(m);
        }
        if i % 10 == 0 {
            store.delete_newest();
        }
        store.check_consistency().unwrap();
    }

    for tag in store.action_tags() {
        let bucket = store.get_by_action(&tag);
        assert!(!bucket.is_empty(), "empty bucket retained for {tag}");
        assert_eq!(bucket, caused_subsequence(&store, &tag));
    }
}

#[test]
fn test_add_is_idempotent() {
    let m = Message::assistant("hi").caused_by("WriteCode");

    let mut once = MemoryStore::new();
    once.add(m.clone());

    let mut twice = MemoryStore::new();
    twice.add(m.clone());
    twice.add(m.clone());

    assert_eq!(once.stats(), twice.stats());
    assert_eq!(once.get_recent(0), twice.get_recent(0));
}

#[test]
fn test_delete_newest_then_readd_restores_state() {
    let mut store = MemoryStore::new();
    store.add_batch(generate(11, 50));
    let count = store.count();
    let tags = store.action_tags();
    let buckets: Vec<_> = tags.iter().map(|t| store.get_by_action(t)).collect();

    let newest = store.delete_newest().unwrap();
    store.add(newest);

    assert_eq!(store.count(), count);
    assert_eq!(store.action_tags(), tags);
    for (t, bucket) in tags.iter().zip(buckets) {
        assert_eq!(store.get_by_action(t), bucket);
    }
}

#[test]
fn test_find_new_properties() {
    let mut store = MemoryStore::new();
    let messages = generate(21, 80);
    store.add_batch(messages.clone());

    assert!(store.find_new(&[], 0).is_empty());
    assert!(store.find_new(&[], 3).is_empty());
    assert!(store.find_new(&messages, 0).is_empty());

    let fresh = vec![Message::user("never seen"), Message::user("also new")];
    let mut observed = messages[..5].to_vec();
    observed.extend(fresh.clone());
    assert_eq!(store.find_new(&observed, 0), fresh);
}

#[test]
fn test_find_new_uses_value_equality() {
    let mut store = MemoryStore::new();
    store.add(Message::assistant("hi").caused_by("WriteCode").with_metadata("round", "1"));

    // rebuilt from scratch, as if decoded from another process
    let rebuilt: Message = serde_json::from_str(
        r#"{"role":"assistant","content":"hi","cause_by":"WriteCode","metadata":{"round":"1"}}"#,
    )
    .unwrap();
    assert!(store.find_new(&[rebuilt], 0).is_empty());
}

#[test]
fn test_role_and_content_queries_follow_log_order() {
    let mut store = MemoryStore::new();
    store.add(Message::new("Alice", "I am a villager"));
    store.add(Message::new("Bob", "Alice is lying"));
    store.add(Message::new("Alice", "Bob is the werewolf"));

    let alice = store.get_by_role("Alice");
    let said: Vec<&str> = alice.iter().map(|m| m.content()).collect();
    assert_eq!(said, vec!["I am a villager", "Bob is the werewolf"]);

    let mentions_bob = store.get_by_content_substring("Bob");
    assert_eq!(mentions_bob.len(), 1);
    assert_eq!(mentions_bob[0].role(), "Alice");

    let mentions_alice: Vec<String> = store
        .try_remember("Alice")
        .iter()
        .map(|m| m.role().to_string())
        .collect();
    assert_eq!(mentions_alice, vec!["Bob"]);
}
