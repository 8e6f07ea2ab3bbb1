//! Structured observability hooks for memory lifecycle events.
//!
//! Events carry an `event` field (`memory.*`) so they can be filtered in
//! JSON log pipelines. Per-message events are emitted at `debug!`; snapshot
//! and bulk events at `info!`.

use std::path::Path;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::message::Message;

/// RAII guard that enters a session-scoped tracing span.
///
/// ```ignore
/// let _span = SessionSpan::enter("team-alpha");
/// // memory events are now tagged with session = "team-alpha"
/// ```
pub struct SessionSpan {
    session_id: String,
    _span: tracing::span::EnteredSpan,
}

impl SessionSpan {
    pub fn enter(session_id: &str) -> Self {
        let span = tracing::info_span!("agent_memory.session", session = %session_id);
        Self {
            session_id: session_id.to_string(),
            _span: span.entered(),
        }
    }

    /// Enter a span under a freshly generated session id.
    pub fn enter_new() -> Self {
        Self::enter(&Uuid::new_v4().to_string())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

pub fn emit_message_added(message: &Message, log_len: usize) {
    debug!(
        event = "memory.message_added",
        id = %message.id().short(),
        role = %message.role(),
        cause_by = message.cause_by().map(|t| t.as_str()).unwrap_or("-"),
        log_len = log_len,
    );
}

pub fn emit_duplicate_skipped(message: &Message) {
    debug!(
        event = "memory.duplicate_skipped",
        id = %message.id().short(),
        role = %message.role(),
    );
}

pub fn emit_message_deleted(message: &Message, log_len: usize) {
    debug!(
        event = "memory.message_deleted",
        id = %message.id().short(),
        role = %message.role(),
        log_len = log_len,
    );
}

pub fn emit_cleared(removed: usize) {
    info!(event = "memory.cleared", removed = removed);
}

pub fn emit_snapshot_saved(location: &Path, messages: usize, bytes: usize) {
    info!(
        event = "memory.snapshot_saved",
        location = %location.display(),
        messages = messages,
        bytes = bytes,
    );
}

pub fn emit_snapshot_loaded(location: &Path, records: usize, messages: usize) {
    info!(
        event = "memory.snapshot_loaded",
        location = %location.display(),
        records = records,
        messages = messages,
    );
}

/// Emitted at `warn!` before a load error is returned to the caller.
pub fn emit_load_failed(location: &Path, error: &dyn std::fmt::Display) {
    warn!(event = "memory.load_failed", location = %location.display(), error = %error);
}
