use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ordered authorization tier. Comparison follows declaration order, so
/// `Viewer < Vip < Subscriber < Moderator < Broadcaster`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    #[default]
    Viewer,
    Vip,
    Subscriber,
    Moderator,
    Broadcaster,
}

impl PermissionLevel {
    pub const ALL: [PermissionLevel; 5] = [
        PermissionLevel::Viewer,
        PermissionLevel::Vip,
        PermissionLevel::Subscriber,
        PermissionLevel::Moderator,
        PermissionLevel::Broadcaster,
    ];

    /// Numeric form used by event scripts (`0` = Viewer … `4` = Broadcaster).
    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Viewer => "viewer",
            PermissionLevel::Vip => "vip",
            PermissionLevel::Subscriber => "subscriber",
            PermissionLevel::Moderator => "moderator",
            PermissionLevel::Broadcaster => "broadcaster",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(PermissionLevel::Viewer),
            "vip" => Ok(PermissionLevel::Vip),
            "subscriber" | "sub" => Ok(PermissionLevel::Subscriber),
            "moderator" | "mod" => Ok(PermissionLevel::Moderator),
            "broadcaster" => Ok(PermissionLevel::Broadcaster),
            other => Err(format!("unknown permission level: {other}")),
        }
    }
}

/// What fires an event: a chat command or a channel-point reward redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Command,
    Reward,
}

impl EventKind {
    /// Numeric form used by event scripts (`0` = Command, `1` = Reward).
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(EventKind::Command),
            1 => Some(EventKind::Reward),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Command => f.write_str("command"),
            EventKind::Reward => f.write_str("reward"),
        }
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "command" => Ok(EventKind::Command),
            "reward" => Ok(EventKind::Reward),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// Catalog identity of an event: trigger name plus kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub name: String,
    pub kind: EventKind,
}

impl EventKey {
    pub fn new(name: impl Into<String>, kind: EventKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn command(name: impl Into<String>) -> Self {
        Self::new(name, EventKind::Command)
    }

    pub fn reward(name: impl Into<String>) -> Self {
        Self::new(name, EventKind::Reward)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Raw role flag reported by the chat platform for a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Viewer,
    Moderator,
    GlobalModerator,
    Staff,
    Admin,
    Broadcaster,
}
