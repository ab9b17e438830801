use actionhub_common::{EventKey, EventKind, PermissionLevel};

/// One trigger firing, as normalized by a connection supervisor.
///
/// The key is resolved against the catalog when the request is dequeued, so
/// a reload between enqueue and dequeue is honoured. The permission is
/// resolved once, at enqueue time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInvocationRequest {
    pub key: EventKey,
    pub sender_name: String,
    pub sender_id: String,
    pub permission: PermissionLevel,
    pub args: Vec<String>,
}

impl EventInvocationRequest {
    pub fn new(
        key: EventKey,
        sender_id: impl Into<String>,
        sender_name: impl Into<String>,
        permission: PermissionLevel,
    ) -> Self {
        Self {
            key,
            sender_name: sender_name.into(),
            sender_id: sender_id.into(),
            permission,
            args: Vec::new(),
        }
    }

    pub fn command(
        name: impl Into<String>,
        sender_id: impl Into<String>,
        sender_name: impl Into<String>,
        permission: PermissionLevel,
    ) -> Self {
        Self::new(EventKey::new(name, EventKind::Command), sender_id, sender_name, permission)
    }

    /// Redeemers are always treated as Viewers.
    pub fn reward(
        title: impl Into<String>,
        sender_id: impl Into<String>,
        sender_name: impl Into<String>,
    ) -> Self {
        Self::new(
            EventKey::new(title, EventKind::Reward),
            sender_id,
            sender_name,
            PermissionLevel::Viewer,
        )
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Tokenize free text on whitespace. Blank input gives no arguments.
    pub fn with_arg_text(self, text: &str) -> Self {
        self.with_args(tokenize_args(text))
    }
}

/// Split on whitespace, dropping empty pieces.
pub fn tokenize_args(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arg_text_is_tokenized_on_whitespace() {
        let req = EventInvocationRequest::command("so", "1", "alice", PermissionLevel::Moderator)
            .with_arg_text("  bob   extra\tword ");
        assert_eq!(req.args, vec!["bob", "extra", "word"]);
    }

    #[test]
    fn blank_arg_text_gives_empty_args() {
        let req = EventInvocationRequest::reward("Hydrate", "1", "alice").with_arg_text("   ");
        assert!(req.args.is_empty());
        assert_eq!(req.permission, PermissionLevel::Viewer);
    }
}
