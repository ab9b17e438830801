//! Contracts for external event sources and the payloads they emit.

use actionhub_common::UserRole;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Everything a source reports back over its signal channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSignal<P> {
    Connected,
    /// The connection is gone. Whether this was expected is decided by the
    /// supervisor, not the source.
    Disconnected,
    Error(String),
    Payload(P),
}

pub type SignalSender<P> = mpsc::UnboundedSender<SourceSignal<P>>;

/// A live connection to one provider (chat, reward stream).
///
/// `connect` receives a fresh signal channel for every session; the source
/// keeps it for as long as the session lives and drops it on disconnect.
#[async_trait]
pub trait EventSource: Send + Sync {
    type Payload: Send + 'static;

    fn name(&self) -> &str;

    /// Open a session. `Ok(false)` means the provider refused.
    async fn connect(&self, signals: SignalSender<Self::Payload>) -> Result<bool>;

    /// Close the current session. `Ok(false)` means there was none.
    async fn disconnect(&self) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Chat payloads
// ---------------------------------------------------------------------------

/// Who sent a chat line, with the raw platform flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSender {
    pub user_id: String,
    pub login: String,
    pub role: UserRole,
    pub is_subscriber: bool,
    pub is_vip: bool,
}

impl ChatSender {
    pub fn viewer(user_id: impl Into<String>, login: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            login: login.into(),
            role: UserRole::Viewer,
            is_subscriber: false,
            is_vip: false,
        }
    }

    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = role;
        self
    }

    pub fn subscriber(mut self) -> Self {
        self.is_subscriber = true;
        self
    }

    pub fn vip(mut self) -> Self {
        self.is_vip = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatPayload {
    /// A plain message, used only for passive accrual.
    Message { sender: ChatSender, text: String },
    /// `!name arg text`
    Command {
        sender: ChatSender,
        name: String,
        arg_text: String,
    },
}

impl ChatPayload {
    /// Classify a raw chat line. Lines starting with `!` followed by a name
    /// are commands; everything else, a bare `!` included, is a message.
    pub fn from_line(sender: ChatSender, line: &str) -> Self {
        if let Some(rest) = line.trim_start().strip_prefix('!') {
            let (name, arg_text) = rest
                .split_once(char::is_whitespace)
                .unwrap_or((rest, ""));
            if !name.is_empty() {
                return ChatPayload::Command {
                    sender,
                    name: name.to_string(),
                    arg_text: arg_text.to_string(),
                };
            }
        }
        ChatPayload::Message {
            sender,
            text: line.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reward payloads
// ---------------------------------------------------------------------------

/// One channel-points reward redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    pub reward_title: String,
    pub user_id: String,
    pub user_login: String,
    pub user_input: String,
}
