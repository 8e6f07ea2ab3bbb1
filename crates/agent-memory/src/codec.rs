//! Durable snapshot encoding for [`MemoryStore`].
//!
//! A snapshot is the log only: an ordered list of message records. The
//! causation index is never written; loading replays `add` for each record,
//! which rebuilds the index and drops any duplicated records.
//!
//! ```json
//! {
//!   "version": 1,
//!   "saved_at": "2024-05-20T12:15:00Z",
//!   "messages": [
//!     {"role": "user", "content": "hello", "cause_by": null, "metadata": {}},
//!     {"role": "assistant", "content": "hi", "cause_by": "WriteCode", "metadata": {}}
//!   ]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::ActionRegistry;
use crate::error::{MemoryError, MemoryResult};
use crate::message::{Message, MessageRecord};
use crate::store::MemoryStore;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Serialized form of a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    /// Older snapshots named this field `storage` and carried an `index`
    /// map next to it; the index is ignored on load.
    #[serde(alias = "storage")]
    pub messages: Vec<MessageRecord>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Capture the log of `store`.
pub fn serialize(store: &MemoryStore) -> Snapshot {
    Snapshot {
        version: SNAPSHOT_VERSION,
        saved_at: Some(Utc::now()),
        messages: store.iter().map(MessageRecord::from).collect(),
    }
}

/// Rebuild a store from `snapshot`, resolving every `cause_by` tag through
/// `registry`.
///
/// Fails with [`MemoryError::UnresolvedAction`] on the first unregistered
/// tag; nothing is returned in that case.
pub fn deserialize(snapshot: Snapshot, registry: &ActionRegistry) -> MemoryResult<MemoryStore> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(MemoryError::UnsupportedVersion {
            found: snapshot.version,
            supported: SNAPSHOT_VERSION,
        });
    }

    let mut store = MemoryStore::new();
    for record in snapshot.messages {
        if let Some(tag) = &record.cause_by {
            registry
                .resolve(tag)
                .map_err(|_| MemoryError::UnresolvedAction {
                    tag: tag.to_string(),
                })?;
        }
        store.add(Message::from(record));
    }
    Ok(store)
}

pub fn to_json(store: &MemoryStore) -> MemoryResult<String> {
    Ok(serde_json::to_string(&serialize(store))?)
}

pub fn to_json_pretty(store: &MemoryStore) -> MemoryResult<String> {
    Ok(serde_json::to_string_pretty(&serialize(store))?)
}

pub fn to_bytes(store: &MemoryStore) -> MemoryResult<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(&serialize(store))?)
}

pub fn from_json(json: &str, registry: &ActionRegistry) -> MemoryResult<MemoryStore> {
    let snapshot: Snapshot = serde_json::from_str(json)?;
    deserialize(snapshot, registry)
}

pub fn from_bytes(bytes: &[u8], registry: &ActionRegistry) -> MemoryResult<MemoryStore> {
    let snapshot: Snapshot = serde_json::from_slice(bytes)?;
    deserialize(snapshot, registry)
}
