//! Append-only message log with a causation index.
//!
//! The log is the source of truth. The index maps each [`ActionTag`] to the
//! sub-sequence of the log caused by that action, and every mutation updates
//! both in the same call. Empty buckets are removed rather than retained.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::action::ActionTag;
use crate::error::{MemoryError, MemoryResult};
use crate::message::{Message, MessageId};
use crate::obs;

/// Summary counts for a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub messages: usize,
    pub caused_messages: usize,
    pub buckets: usize,
}

/// In-process message memory.
///
/// Query methods return owned vectors of shared handles; nothing returned
/// aliases the internal containers, so results stay valid across later
/// mutations.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    log: Vec<Arc<Message>>,
    index: HashMap<ActionTag, Vec<Arc<Message>>>,
    seen: HashSet<MessageId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` unless an equal message is already stored.
    ///
    /// Returns `true` when the message was inserted.
    pub fn add(&mut self, message: Message) -> bool {
        if self.seen.contains(message.id()) {
            obs::emit_duplicate_skipped(&message);
            return false;
        }

        let message = Arc::new(message);
        self.seen.insert(message.id().clone());
        if let Some(tag) = message.cause_by() {
            self.index
                .entry(tag.clone())
                .or_default()
                .push(Arc::clone(&message));
        }
        self.log.push(message);

        if let Some(last) = self.log.last() {
            obs::emit_message_added(last, self.log.len());
        }
        true
    }

    /// Add each message in order. Not transactional: messages already added
    /// stay added if the caller stops early. Returns how many were inserted.
    pub fn add_batch(&mut self, messages: impl IntoIterator<Item = Message>) -> usize {
        let mut inserted = 0;
        for message in messages {
            if self.add(message) {
                inserted += 1;
            }
        }
        inserted
    }

    pub fn get_by_role(&self, role: &str) -> Vec<Arc<Message>> {
        self.log
            .iter()
            .filter(|m| m.role() == role)
            .cloned()
            .collect()
    }

    /// Messages whose content contains `needle` (case-sensitive).
    pub fn get_by_content_substring(&self, needle: &str) -> Vec<Arc<Message>> {
        self.log
            .iter()
            .filter(|m| m.content().contains(needle))
            .cloned()
            .collect()
    }

    /// Recall every message mentioning `keyword`.
    pub fn try_remember(&self, keyword: &str) -> Vec<Arc<Message>> {
        self.get_by_content_substring(keyword)
    }

    /// Messages caused by `tag`, in log order.
    pub fn get_by_action(&self, tag: &ActionTag) -> Vec<Arc<Message>> {
        self.index.get(tag).cloned().unwrap_or_default()
    }

    /// Concatenation of [`get_by_action`](Self::get_by_action) for each tag,
    /// in the order given. Unknown tags contribute nothing.
    pub fn get_by_actions<'a>(
        &self,
        tags: impl IntoIterator<Item = &'a ActionTag>,
    ) -> Vec<Arc<Message>> {
        let mut out = Vec::new();
        for tag in tags {
            if let Some(bucket) = self.index.get(tag) {
                out.extend(bucket.iter().cloned());
            }
        }
        out
    }

    /// The most recent `k` messages in log order.
    ///
    /// **`k == 0` returns the whole log**, not an empty result. A `k` larger
    /// than the log also returns the whole log.
    pub fn get_recent(&self, k: usize) -> Vec<Arc<Message>> {
        self.recent_slice(k).to_vec()
    }

    fn recent_slice(&self, k: usize) -> &[Arc<Message>] {
        if k == 0 || k >= self.log.len() {
            &self.log
        } else {
            &self.log[self.log.len() - k..]
        }
    }

    /// Elements of `observed` (in their given order) that are not among the
    /// `k` most recent stored messages (`k == 0`: the whole log).
    pub fn find_new(&self, observed: &[Message], k: usize) -> Vec<Message> {
        if observed.is_empty() {
            return Vec::new();
        }
        let window: HashSet<&MessageId> = if k == 0 {
            self.seen.iter().collect()
        } else {
            self.recent_slice(k).iter().map(|m| m.id()).collect()
        };
        observed
            .iter()
            .filter(|m| !window.contains(m.id()))
            .cloned()
            .collect()
    }

    /// Remove and return the most recent message.
    pub fn delete_newest(&mut self) -> Option<Message> {
        let newest = self.log.pop()?;
        self.unindex(&newest);
        obs::emit_message_deleted(&newest, self.log.len());
        Some(Arc::unwrap_or_clone(newest))
    }

    /// Remove the stored message equal to `message`.
    pub fn delete(&mut self, message: &Message) -> MemoryResult<()> {
        let pos = self
            .log
            .iter()
            .position(|m| m.as_ref() == message)
            .ok_or_else(|| MemoryError::NotFound {
                role: message.role().to_string(),
                preview: message.preview(),
            })?;
        let removed = self.log.remove(pos);
        self.unindex(&removed);
        obs::emit_message_deleted(&removed, self.log.len());
        Ok(())
    }

    fn unindex(&mut self, message: &Message) {
        self.seen.remove(message.id());
        let Some(tag) = message.cause_by() else {
            return;
        };
        if let Some(bucket) = self.index.get_mut(tag) {
            if let Some(pos) = bucket.iter().position(|m| m.as_ref() == message) {
                bucket.remove(pos);
            }
            if bucket.is_empty() {
                self.index.remove(tag);
            }
        }
    }

    pub fn clear(&mut self) {
        let removed = self.log.len();
        self.log = Vec::new();
        self.index = HashMap::new();
        self.seen = HashSet::new();
        obs::emit_cleared(removed);
    }

    pub fn count(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn contains(&self, message: &Message) -> bool {
        self.seen.contains(message.id())
    }

    /// Tags that currently have at least one message, sorted.
    pub fn action_tags(&self) -> Vec<ActionTag> {
        let mut tags: Vec<ActionTag> = self.index.keys().cloned().collect();
        tags.sort();
        tags
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            messages: self.log.len(),
            caused_messages: self.index.values().map(Vec::len).sum(),
            buckets: self.index.len(),
        }
    }

    /// Iterate the log in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.log.iter().map(|m| m.as_ref())
    }

    /// Verify that the index is exactly the caused sub-sequence of the log.
    pub fn check_consistency(&self) -> MemoryResult<()> {
        let mut expected: HashMap<&ActionTag, Vec<&MessageId>> = HashMap::new();
        for m in &self.log {
            if let Some(tag) = m.cause_by() {
                expected.entry(tag).or_default().push(m.id());
            }
        }

        if expected.len() != self.index.len() {
            return Err(MemoryError::InconsistentIndex(format!(
                "{} tags in log, {} buckets in index",
                expected.len(),
                self.index.len()
            )));
        }
        for (tag, bucket) in &self.index {
            let actual: Vec<&MessageId> = bucket.iter().map(|m| m.id()).collect();
            match expected.get(tag) {
                Some(ids) if *ids == actual => {}
                _ => {
                    return Err(MemoryError::InconsistentIndex(format!(
                        "bucket {tag} does not mirror the log"
                    )))
                }
            }
        }
        if self.seen.len() != self.log.len() {
            return Err(MemoryError::InconsistentIndex(format!(
                "{} identities for {} messages",
                self.seen.len(),
                self.log.len()
            )));
        }
        Ok(())
    }
}

impl Extend<Message> for MemoryStore {
    fn extend<T: IntoIterator<Item = Message>>(&mut self, iter: T) {
        self.add_batch(iter);
    }
}

impl FromIterator<Message> for MemoryStore {
    fn from_iter<T: IntoIterator<Item = Message>>(iter: T) -> Self {
        let mut store = MemoryStore::new();
        store.add_batch(iter);
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> ActionTag {
        ActionTag::from(s)
    }

    fn hello() -> Message {
        Message::user("hello")
    }

    fn hi() -> Message {
        Message::assistant("hi").caused_by("WriteCode")
    }

    #[test]
    fn test_two_message_scenario() {
        let mut store = MemoryStore::new();
        store.add(hello());
        store.add(hi());

        assert_eq!(store.count(), 2);
        let by_action = store.get_by_action(&tag("WriteCode"));
        assert_eq!(by_action.len(), 1);
        assert_eq!(*by_action[0], hi());
        let by_role = store.get_by_role("user");
        assert_eq!(by_role.len(), 1);
        assert_eq!(*by_role[0], hello());
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let mut store = MemoryStore::new();
        assert!(store.add(hello()));
        assert!(store.add(hi()));
        assert!(!store.add(hi()));
        assert_eq!(store.count(), 2);
        assert_eq!(store.get_by_action(&tag("WriteCode")).len(), 1);
        store.check_consistency().unwrap();
    }

    #[test]
    fn test_add_batch_counts_inserted() {
        let mut store = MemoryStore::new();
        let n = store.add_batch(vec![hello(), hi(), hello()]);
        assert_eq!(n, 2);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_content_search_is_case_sensitive() {
        let mut store = MemoryStore::new();
        store.add(Message::user("Hello world"));
        store.add(Message::user("hello there"));
        assert_eq!(store.get_by_content_substring("hello").len(), 1);
        assert_eq!(store.get_by_content_substring("ello").len(), 2);
        assert_eq!(store.try_remember("world").len(), 1);
    }

    #[test]
    fn test_get_by_actions_preserves_tag_order() {
        let mut store = MemoryStore::new();
        store.add(Message::assistant("code").caused_by("WriteCode"));
        store.add(Message::assistant("prd").caused_by("WritePRD"));
        store.add(Message::assistant("code2").caused_by("WriteCode"));

        let out = store.get_by_actions(&[tag("WritePRD"), tag("Missing"), tag("WriteCode")]);
        let contents: Vec<&str> = out.iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["prd", "code", "code2"]);
    }

    #[test]
    fn test_get_recent_zero_means_all() {
        let mut store = MemoryStore::new();
        for i in 0..5 {
            store.add(Message::user(format!("m{i}")));
        }
        assert_eq!(store.get_recent(0).len(), 5);
        assert_eq!(store.get_recent(10).len(), 5);
        let recent = store.get_recent(2);
        let last_two: Vec<&str> = recent.iter().map(|m| m.content()).collect();
        assert_eq!(last_two, vec!["m3", "m4"]);
    }

    #[test]
    fn test_get_recent_on_empty_store() {
        let store = MemoryStore::new();
        assert!(store.get_recent(0).is_empty());
        assert!(store.get_recent(3).is_empty());
    }

    #[test]
    fn test_find_new_windows() {
        let mut store = MemoryStore::new();
        store.add(Message::user("a"));
        store.add(Message::user("b"));
        store.add(Message::user("c"));

        let observed = vec![Message::user("a"), Message::user("d"), Message::user("c")];
        let all_window: Vec<String> = store
            .find_new(&observed, 0)
            .iter()
            .map(|m| m.content().to_string())
            .collect();
        assert_eq!(all_window, vec!["d"]);

        // "a" falls outside the last-two window, so it counts as new again
        let recent_window: Vec<String> = store
            .find_new(&observed, 2)
            .iter()
            .map(|m| m.content().to_string())
            .collect();
        assert_eq!(recent_window, vec!["a", "d"]);

        assert!(store.find_new(&[], 0).is_empty());
    }

    #[test]
    fn test_delete_newest_removes_from_bucket() {
        let mut store = MemoryStore::new();
        store.add(hello());
        store.add(hi());

        let popped = store.delete_newest().unwrap();
        assert_eq!(popped, hi());
        assert_eq!(store.count(), 1);
        assert!(store.get_by_action(&tag("WriteCode")).is_empty());
        assert!(store.action_tags().is_empty());
        store.check_consistency().unwrap();

        store.delete_newest();
        assert!(store.delete_newest().is_none());
    }

    #[test]
    fn test_delete_newest_then_readd_restores() {
        let mut store = MemoryStore::new();
        store.add(hello());
        store.add(hi());
        let before = store.stats();

        let popped = store.delete_newest().unwrap();
        store.add(popped);
        assert_eq!(store.stats(), before);
        assert_eq!(store.get_by_action(&tag("WriteCode")), vec![Arc::new(hi())]);
    }

    #[test]
    fn test_delete_by_value() {
        let mut store = MemoryStore::new();
        let a = Message::assistant("a").caused_by("WriteCode");
        let b = Message::assistant("b").caused_by("WriteCode");
        store.add(a.clone());
        store.add(b.clone());

        store.delete(&a).unwrap();
        let bucket = store.get_by_action(&tag("WriteCode"));
        assert_eq!(bucket.len(), 1);
        assert_eq!(*bucket[0], b);
        store.check_consistency().unwrap();
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let mut store = MemoryStore::new();
        store.add(hello());
        let err = store.delete(&hi()).unwrap_err();
        assert!(matches!(err, MemoryError::NotFound { .. }));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_deleted_message_can_be_readded() {
        let mut store = MemoryStore::new();
        store.add(hello());
        store.delete(&hello()).unwrap();
        assert!(!store.contains(&hello()));
        assert!(store.add(hello()));
    }

    #[test]
    fn test_clear() {
        let mut store = MemoryStore::new();
        store.add(hello());
        store.add(hi());
        store.clear();
        assert!(store.is_empty());
        assert!(store.action_tags().is_empty());
        assert!(store.add(hi()));
    }

    #[test]
    fn test_fresh_stores_share_nothing() {
        let mut a = MemoryStore::new();
        let b = MemoryStore::default();
        a.add(hi());
        assert_eq!(b.count(), 0);
        assert!(b.get_by_action(&tag("WriteCode")).is_empty());
    }

    #[test]
    fn test_query_results_survive_mutation() {
        let mut store = MemoryStore::new();
        store.add(hi());
        let snapshot = store.get_by_action(&tag("WriteCode"));
        store.clear();
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_stats() {
        let mut store: MemoryStore = vec![
            hello(),
            hi(),
            Message::assistant("prd").caused_by("WritePRD"),
        ]
        .into_iter()
        .collect();
        store.extend([Message::user("again")]);
        assert_eq!(
            store.stats(),
            MemoryStats {
                messages: 4,
                caused_messages: 2,
                buckets: 2,
            }
        );
        assert_eq!(store.action_tags(), vec![tag("WriteCode"), tag("WritePRD")]);
    }
}
