//! Event definitions and the immutable catalog that indexes them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use actionhub_common::{EventKey, EventKind, PermissionLevel};

use crate::cooldown::Cooldown;

/// Opaque handle to a scripted routine. The script runtime resolves it; the
/// engine only passes it back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionHandle(Arc<str>);

impl ActionHandle {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One triggerable action and its gates.
#[derive(Debug)]
pub struct EventDefinition {
    pub name: String,
    pub kind: EventKind,
    pub action: ActionHandle,
    pub permission: PermissionLevel,
    pub cost: i64,
    pub cooldown: Cooldown,
}

impl EventDefinition {
    /// A chat command. Cost is clamped to be non-negative.
    pub fn command(
        name: impl Into<String>,
        action: ActionHandle,
        permission: PermissionLevel,
        cooldown: Option<Duration>,
        cost: i64,
    ) -> Self {
        Self {
            name: name.into(),
            kind: EventKind::Command,
            action,
            permission,
            cost: cost.max(0),
            cooldown: Cooldown::new(cooldown),
        }
    }

    /// A reward redemption: the platform already charged its own points, so
    /// there is no cooldown, no cost and no gate above Viewer.
    pub fn reward(name: impl Into<String>, action: ActionHandle) -> Self {
        Self {
            name: name.into(),
            kind: EventKind::Reward,
            action,
            permission: PermissionLevel::Viewer,
            cost: 0,
            cooldown: Cooldown::none(),
        }
    }

    pub fn key(&self) -> EventKey {
        EventKey::new(self.name.clone(), self.kind)
    }

    pub fn cooldown_threshold(&self) -> Option<Duration> {
        self.cooldown.threshold()
    }
}

/// Immutable mapping from (trigger name, kind) to definition. Replaced
/// wholesale on reload, never edited in place.
#[derive(Debug, Default)]
pub struct Catalog {
    events: HashMap<EventKey, Arc<EventDefinition>>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from definitions. A later definition with the same key
    /// replaces an earlier one.
    pub fn from_definitions(definitions: impl IntoIterator<Item = EventDefinition>) -> Self {
        let events = definitions
            .into_iter()
            .map(|def| (def.key(), Arc::new(def)))
            .collect();
        Self { events }
    }

    pub fn lookup(&self, key: &EventKey) -> Option<Arc<EventDefinition>> {
        self.events.get(key).cloned()
    }

    pub fn contains(&self, key: &EventKey) -> bool {
        self.events.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<EventDefinition>> {
        self.events.values()
    }
}
