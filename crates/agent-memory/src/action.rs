//! Action tags and the registry that resolves them.
//!
//! Every message records the action *type* that produced it as a stable
//! string tag. Tags are resolved back to an [`ActionDescriptor`] through an
//! explicitly populated [`ActionRegistry`], so persisted snapshots never
//! depend on runtime type handles.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{MemoryError, MemoryResult};

/// Stable identifier for an action type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionTag(String);

impl ActionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Tag of an [`Action`] type.
    pub fn of<A: Action>() -> Self {
        Self(A::TAG.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionTag {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ActionTag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ActionTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An action type whose executions produce messages.
pub trait Action: 'static {
    /// Stable tag written into every message this action causes.
    const TAG: &'static str;

    const DESCRIPTION: &'static str = "";
}

/// What a tag resolves to: the caller-side representation of an action type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub tag: ActionTag,
    pub type_name: String,
    pub description: String,
}

impl ActionDescriptor {
    pub fn new(tag: impl Into<ActionTag>, type_name: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            type_name: type_name.into(),
            description: String::new(),
        }
    }

    /// Descriptor for a Rust [`Action`] type.
    pub fn of<A: Action>() -> Self {
        Self {
            tag: ActionTag::of::<A>(),
            type_name: std::any::type_name::<A>().to_string(),
            description: A::DESCRIPTION.to_string(),
        }
    }

    /// Descriptor for an action known only by tag (e.g. declared in config).
    pub fn external(tag: impl Into<ActionTag>) -> Self {
        let tag = tag.into();
        Self {
            type_name: format!("external::{tag}"),
            tag,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Table of known action tags.
///
/// Populated explicitly at startup and then shared read-only (see
/// [`ActionRegistry::freeze`]). There is no process-global instance.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<ActionTag, ActionDescriptor>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with [`builtin`] actions.
    pub fn with_builtin_actions() -> MemoryResult<Self> {
        let mut registry = Self::new();
        registry.register_builtin_actions()?;
        Ok(registry)
    }

    /// Add every [`builtin`] action, failing on the first tag already bound
    /// to something else.
    pub fn register_builtin_actions(&mut self) -> MemoryResult<()> {
        builtin::register_all(self)
    }

    /// Bind `tag` to `descriptor`.
    ///
    /// Re-registering an equal descriptor is a no-op. Binding a tag that is
    /// already bound to a different descriptor fails with
    /// [`MemoryError::DuplicateTag`].
    pub fn register(
        &mut self,
        tag: impl Into<ActionTag>,
        descriptor: ActionDescriptor,
    ) -> MemoryResult<()> {
        let tag = tag.into();
        if tag.as_str().trim().is_empty() {
            return Err(MemoryError::InvalidTag("tag must not be empty".into()));
        }
        if descriptor.tag != tag {
            return Err(MemoryError::InvalidTag(format!(
                "descriptor tag {} does not match {tag}",
                descriptor.tag
            )));
        }

        match self.actions.get(&tag) {
            Some(existing) if *existing == descriptor => Ok(()),
            Some(existing) => Err(MemoryError::DuplicateTag {
                tag: tag.to_string(),
                existing: existing.type_name.clone(),
                attempted: descriptor.type_name,
            }),
            None => {
                tracing::debug!(event = "registry.action_registered", tag = %tag);
                self.actions.insert(tag, descriptor);
                Ok(())
            }
        }
    }

    /// Register an [`Action`] type under its own tag.
    pub fn register_action<A: Action>(&mut self) -> MemoryResult<()> {
        self.register(A::TAG, ActionDescriptor::of::<A>())
    }

    /// Resolve a tag to its descriptor.
    pub fn resolve(&self, tag: &ActionTag) -> MemoryResult<&ActionDescriptor> {
        self.actions.get(tag).ok_or_else(|| MemoryError::UnknownTag {
            tag: tag.to_string(),
        })
    }

    pub fn contains(&self, tag: &ActionTag) -> bool {
        self.actions.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// All registered tags, sorted.
    pub fn tags(&self) -> Vec<ActionTag> {
        let mut tags: Vec<ActionTag> = self.actions.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Finish registration and share the table.
    pub fn freeze(self) -> Arc<ActionRegistry> {
        Arc::new(self)
    }
}

/// Standard actions of a software-company style agent team.
pub mod builtin {
    use super::{Action, ActionRegistry};
    use crate::error::MemoryResult;

    macro_rules! builtin_actions {
        ($($name:ident => $desc:literal),* $(,)?) => {
            $(
                #[derive(Debug, Clone, Copy, Default)]
                pub struct $name;

                impl Action for $name {
                    const TAG: &'static str = stringify!($name);
                    const DESCRIPTION: &'static str = $desc;
                }
            )*

            /// Tags of every builtin action.
            pub const ALL_TAGS: &[&str] = &[$(stringify!($name)),*];

            pub(super) fn register_all(registry: &mut ActionRegistry) -> MemoryResult<()> {
                $(
                    registry.register_action::<$name>()?;
                )*
                Ok(())
            }
        };
    }

    builtin_actions! {
        UserRequirement => "Raw requirement submitted by a human",
        WritePRD => "Product requirement document",
        WriteDesign => "System design",
        WriteCode => "Source code",
        WriteCodeReview => "Code review feedback",
        WriteTest => "Test code",
        WriteAnalysisCode => "Data analysis code",
        Speak => "Public utterance in a game round",
        Hunt => "Night-time whisper choosing a target",
        Impersonate => "Speech delivered while disguising one's role",
    }
}
