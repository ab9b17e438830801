//! Chat payload routing: commands become requests, plain messages earn
//! passive points.

use std::sync::Arc;

use actionhub_common::{resolve_permission, EventKey};
use actionhub_engine::{CatalogStore, EventInvocationRequest, Ledger};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::source::{ChatPayload, ChatSender};
use crate::supervisor::PayloadRouter;

/// Invisible tag character some chat clients append to defeat duplicate
/// message filters.
const INVISIBLE_TAG: char = '\u{E0000}';

/// Passive accrual for plain chat messages.
#[derive(Debug, Clone)]
pub struct AccrualPolicy {
    pub points_per_message: i64,
    pub min_message_len: usize,
}

pub struct ChatRouter {
    catalog: Arc<CatalogStore>,
    ledger: Arc<dyn Ledger>,
    bot_login: String,
    accrual: AccrualPolicy,
}

impl ChatRouter {
    pub fn new(
        catalog: Arc<CatalogStore>,
        ledger: Arc<dyn Ledger>,
        bot_login: impl Into<String>,
        accrual: AccrualPolicy,
    ) -> Self {
        Self {
            catalog,
            ledger,
            bot_login: bot_login.into(),
            accrual,
        }
    }

    async fn accrue(&self, sender: &ChatSender, text: &str) {
        if self.accrual.points_per_message <= 0
            || text.chars().count() < self.accrual.min_message_len
            || sender.login.eq_ignore_ascii_case(&self.bot_login)
        {
            return;
        }

        match self
            .ledger
            .credit(&sender.user_id, self.accrual.points_per_message)
            .await
        {
            Ok(balance) => info!(
                sender = %sender.login,
                points = self.accrual.points_per_message,
                balance,
                "Awarded points for chat message"
            ),
            Err(e) => warn!(sender = %sender.login, error = %e, "Failed to award chat points"),
        }
    }

    fn command_request(
        &self,
        sender: ChatSender,
        name: String,
        arg_text: &str,
    ) -> Option<EventInvocationRequest> {
        if !self.catalog.contains(&EventKey::command(name.as_str())) {
            debug!(command = %name, sender = %sender.login, "Unknown command, ignoring");
            return None;
        }

        let permission = resolve_permission(sender.role, sender.is_subscriber, sender.is_vip);
        Some(
            EventInvocationRequest::command(name, sender.user_id, sender.login, permission)
                .with_arg_text(&clean_args(arg_text)),
        )
    }
}

#[async_trait]
impl PayloadRouter<ChatPayload> for ChatRouter {
    async fn route(&self, payload: ChatPayload) -> Option<EventInvocationRequest> {
        match payload {
            ChatPayload::Message { sender, text } => {
                self.accrue(&sender, &text).await;
                None
            }
            ChatPayload::Command {
                sender,
                name,
                arg_text,
            } => self.command_request(sender, name, &arg_text),
        }
    }
}

/// Strip the invisible tag character and surrounding whitespace.
pub fn clean_args(arg_text: &str) -> String {
    arg_text.replace(INVISIBLE_TAG, "").trim().to_string()
}
