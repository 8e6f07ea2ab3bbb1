//! Messages exchanged between agents.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::action::{Action, ActionTag};

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// Content identity of a [`Message`] (SHA-256 hex over every field).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    fn compute(
        role: &str,
        content: &str,
        cause_by: Option<&ActionTag>,
        metadata: &BTreeMap<String, String>,
    ) -> Self {
        fn field(hasher: &mut Sha256, bytes: &[u8]) {
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }

        let mut hasher = Sha256::new();
        field(&mut hasher, role.as_bytes());
        field(&mut hasher, content.as_bytes());
        match cause_by {
            Some(tag) => {
                hasher.update([1u8]);
                field(&mut hasher, tag.as_str().as_bytes());
            }
            None => hasher.update([0u8]),
        }
        hasher.update((metadata.len() as u64).to_le_bytes());
        for (k, v) in metadata {
            field(&mut hasher, k.as_bytes());
            field(&mut hasher, v.as_bytes());
        }
        MessageId(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single communication between agents.
///
/// Immutable once built: the builder methods consume and return a new value,
/// and the content identity is recomputed each time. Two messages are equal
/// iff role, content, `cause_by`, and metadata are all equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "MessageRecord", into = "MessageRecord")]
pub struct Message {
    role: String,
    content: String,
    cause_by: Option<ActionTag>,
    metadata: BTreeMap<String, String>,
    id: MessageId,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self::from_parts(role.into(), content.into(), None, BTreeMap::new())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ROLE_USER, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ROLE_ASSISTANT, content)
    }

    fn from_parts(
        role: String,
        content: String,
        cause_by: Option<ActionTag>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        let id = MessageId::compute(&role, &content, cause_by.as_ref(), &metadata);
        Self {
            role,
            content,
            cause_by,
            metadata,
            id,
        }
    }

    /// Record the action that produced this message.
    pub fn caused_by(self, tag: impl Into<ActionTag>) -> Self {
        Self::from_parts(self.role, self.content, Some(tag.into()), self.metadata)
    }

    /// Record an [`Action`] type as the producer.
    pub fn caused_by_action<A: Action>(self) -> Self {
        self.caused_by(ActionTag::of::<A>())
    }

    pub fn with_metadata(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut metadata = self.metadata;
        metadata.insert(key.into(), value.into());
        Self::from_parts(self.role, self.content, self.cause_by, metadata)
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn cause_by(&self) -> Option<&ActionTag> {
        self.cause_by.as_ref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// First 48 characters of the content, for logs and error messages.
    pub fn preview(&self) -> String {
        self.content.chars().take(48).collect()
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.role == other.role
            && self.content == other.content
            && self.cause_by == other.cause_by
            && self.metadata == other.metadata
    }
}

impl Eq for Message {}

impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Durable form of a [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub cause_by: Option<ActionTag>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl From<MessageRecord> for Message {
    fn from(r: MessageRecord) -> Self {
        Message::from_parts(r.role, r.content, r.cause_by, r.metadata)
    }
}

impl From<Message> for MessageRecord {
    fn from(m: Message) -> Self {
        MessageRecord {
            role: m.role,
            content: m.content,
            cause_by: m.cause_by,
            metadata: m.metadata,
        }
    }
}

impl From<&Message> for MessageRecord {
    fn from(m: &Message) -> Self {
        m.clone().into()
    }
}
