//! Agent Memory
//!
//! In-process message store for cooperating agents. Every message is
//! appended to an insertion-ordered log and, when it records the action that
//! produced it, to that action's bucket in a causation index, so agents can
//! recall "everything produced by action X" without scanning the log.
//!
//! - [`MemoryStore`]: log + index, deduplicating by value
//! - [`SharedMemory`]: lock-guarded handle for concurrent readers
//! - [`ActionRegistry`]: resolves persisted action tags
//! - [`codec`] / [`persist`]: durable snapshots of the log

pub mod action;
pub mod codec;
pub mod config;
pub mod error;
pub mod message;
pub mod obs;
pub mod persist;
pub mod shared;
pub mod store;
pub mod telemetry;

pub use action::{builtin, Action, ActionDescriptor, ActionRegistry, ActionTag};
pub use codec::{Snapshot, SNAPSHOT_VERSION};
pub use config::MemoryConfig;
pub use error::{MemoryError, MemoryResult};
pub use message::{Message, MessageId, MessageRecord, ROLE_ASSISTANT, ROLE_USER};
pub use obs::SessionSpan;
pub use persist::{FsSnapshotStore, InMemorySnapshotStore, SnapshotStore, SNAPSHOT_FILE};
pub use shared::SharedMemory;
pub use store::{MemoryStats, MemoryStore};
pub use telemetry::init_tracing;
