//! Ports to the collaborators the engine drives but does not implement.

use anyhow::Result;
use async_trait::async_trait;

use crate::catalog::ActionHandle;

/// Points balances keyed by platform user id.
///
/// Mutations are signed deltas applied atomically by the implementation;
/// callers never read a balance and write it back. An unknown id is
/// provisioned with a zero balance on first reference.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balance(&self, user_id: &str) -> Result<i64>;

    /// Apply a signed delta and return the new balance.
    async fn add_points(&self, user_id: &str, delta: i64) -> Result<i64>;

    async fn set_points(&self, user_id: &str, points: i64) -> Result<()>;

    /// Every known (display name, balance) pair.
    async fn all_points(&self) -> Result<Vec<(String, i64)>>;

    async fn credit(&self, user_id: &str, amount: i64) -> Result<i64> {
        self.add_points(user_id, amount).await
    }

    async fn debit(&self, user_id: &str, amount: i64) -> Result<i64> {
        self.add_points(user_id, -amount).await
    }
}

/// Platform lookup between user ids and login names.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn login_for_id(&self, user_id: &str) -> Result<Option<String>>;

    async fn id_for_login(&self, login: &str) -> Result<Option<String>>;
}

/// Arguments handed to a scripted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub sender_id: String,
    pub sender_name: String,
    pub args: Vec<String>,
}

/// Runs user-scripted actions. An invocation may take arbitrarily long.
#[async_trait]
pub trait ScriptRuntime: Send + Sync {
    async fn invoke(&self, action: &ActionHandle, invocation: &Invocation) -> Result<()>;
}

/// Outbound chat. Best-effort: delivery is never confirmed.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_chat_message(&self, text: &str) -> Result<()>;

    async fn send_whisper(&self, target: &str, text: &str) -> Result<()>;
}
