//! Local stand-ins for the platform: a stdin chat source, a runtime that only
//! logs invocations, a reply sink that logs outbound chat and a directory in
//! which a user's id is their lowercased login.

use std::sync::{Mutex, PoisonError};

use actionhub_common::UserRole;
use actionhub_engine::{ActionHandle, Invocation, ReplySink, ScriptRuntime, UserDirectory};
use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::source::{ChatPayload, ChatSender, EventSource, SignalSender, SourceSignal};

/// Reads operator lines from stdin as broadcaster chat.
pub struct ConsoleChatSource {
    sender: ChatSender,
    session: Mutex<Option<CancellationToken>>,
}

impl ConsoleChatSource {
    pub fn new(login: impl Into<String>) -> Self {
        let login = login.into();
        Self {
            sender: ChatSender::viewer(login.to_lowercase(), login).with_role(UserRole::Broadcaster),
            session: Mutex::new(None),
        }
    }

    fn take_session(&self) -> Option<CancellationToken> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[async_trait]
impl EventSource for ConsoleChatSource {
    type Payload = ChatPayload;

    fn name(&self) -> &str {
        "console"
    }

    async fn connect(&self, signals: SignalSender<ChatPayload>) -> Result<bool> {
        let session = CancellationToken::new();
        if let Some(previous) = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(session.clone())
        {
            previous.cancel();
        }

        let sender = self.sender.clone();
        tokio::spawn(async move {
            let _ = signals.send(SourceSignal::Connected);
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                let line = tokio::select! {
                    _ = session.cancelled() => return,
                    line = lines.next_line() => line,
                };
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        let payload = ChatPayload::from_line(sender.clone(), &line);
                        if signals.send(SourceSignal::Payload(payload)).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {
                        info!("Console input closed");
                        // Keep the session open; EOF is not a dropped connection.
                        session.cancelled().await;
                        return;
                    }
                    Err(e) => {
                        let _ = signals.send(SourceSignal::Error(e.to_string()));
                        let _ = signals.send(SourceSignal::Disconnected);
                        return;
                    }
                }
            }
        });
        Ok(true)
    }

    async fn disconnect(&self) -> Result<bool> {
        match self.take_session() {
            Some(session) => {
                session.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Runtime that logs each invocation instead of running a script.
#[derive(Debug, Default)]
pub struct LoggingRuntime;

#[async_trait]
impl ScriptRuntime for LoggingRuntime {
    async fn invoke(&self, action: &ActionHandle, invocation: &Invocation) -> Result<()> {
        info!(
            action = %action,
            sender = %invocation.sender_name,
            args = ?invocation.args,
            "Action invoked"
        );
        Ok(())
    }
}

/// Reply sink that writes outbound chat to the log.
#[derive(Debug, Default)]
pub struct TracingReplies;

#[async_trait]
impl ReplySink for TracingReplies {
    async fn send_chat_message(&self, text: &str) -> Result<()> {
        info!(text, "Chat message");
        Ok(())
    }

    async fn send_whisper(&self, target: &str, text: &str) -> Result<()> {
        info!(recipient = target, text, "Whisper");
        Ok(())
    }
}

/// Directory where a user's id is their lowercased login.
#[derive(Debug, Default)]
pub struct LocalDirectory;

#[async_trait]
impl UserDirectory for LocalDirectory {
    async fn login_for_id(&self, user_id: &str) -> Result<Option<String>> {
        Ok(normalize_login(user_id))
    }

    async fn id_for_login(&self, login: &str) -> Result<Option<String>> {
        let id = normalize_login(login);
        if id.is_none() {
            warn!(login, "Blank login");
        }
        Ok(id)
    }
}

fn normalize_login(login: &str) -> Option<String> {
    let login = login.trim();
    (!login.is_empty()).then(|| login.to_lowercase())
}
