//! The hub: owns the catalog, the dispatch loop, both connection
//! supervisors, the clip timer and the ledger, and is the single control
//! surface the binary drives.

use std::fmt;
use std::sync::Arc;

use actionhub_common::Settings;
use actionhub_engine::{
    dispatch_queue, CatalogLoader, CatalogSource, CatalogStore, DispatchQueue, Executor,
    ExecutorStats, Ledger, ReplySink, ScriptRuntime, UserDirectory,
};
use anyhow::{anyhow, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use crate::chat::{AccrualPolicy, ChatRouter};
use crate::clips::{ClipAwardPolicy, ClipAwarder, ClipFeed};
use crate::reward::{RedemptionRouter, TopicRegistrar};
use crate::source::{ChatPayload, EventSource, Redemption};
use crate::state::{MemoryWatermarkStore, WatermarkStore};
use crate::supervisor::{ConnectionState, ConnectionSupervisor};

/// Everything the hub is wired from. Platform-backed pieces are optional:
/// without a reward source or clip feed those features stay off.
#[derive(TypedBuilder)]
pub struct HubDeps {
    pub settings: Settings,
    pub bot_login: String,
    #[builder(default)]
    pub broadcaster_id: Option<String>,
    pub catalog_source: Arc<dyn CatalogSource>,
    pub chat_source: Arc<dyn EventSource<Payload = ChatPayload>>,
    #[builder(default, setter(strip_option))]
    pub reward_source: Option<Arc<dyn EventSource<Payload = Redemption>>>,
    #[builder(default, setter(strip_option))]
    pub registrar: Option<Arc<dyn TopicRegistrar>>,
    #[builder(default, setter(strip_option))]
    pub clip_feed: Option<Arc<dyn ClipFeed>>,
    /// Clip watermark persistence. Kept in memory when absent.
    #[builder(default, setter(strip_option))]
    pub watermarks: Option<Arc<dyn WatermarkStore>>,
    pub ledger: Arc<dyn Ledger>,
    pub directory: Arc<dyn UserDirectory>,
    pub runtime: Arc<dyn ScriptRuntime>,
    pub replies: Arc<dyn ReplySink>,
}

struct RewardLink {
    supervisor: ConnectionSupervisor<Redemption>,
    router: Arc<RedemptionRouter>,
}

/// Snapshot of the hub for operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubStatus {
    pub chat: ConnectionState,
    pub rewards: Option<ConnectionState>,
    pub topics_healthy: bool,
    pub clip_timer_running: bool,
    pub events: usize,
    pub pending: usize,
}

impl fmt::Display for HubStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chat={}", self.chat)?;
        match self.rewards {
            Some(state) => write!(f, " rewards={state} topics_healthy={}", self.topics_healthy)?,
            None => write!(f, " rewards=off")?,
        }
        write!(
            f,
            " clip_timer={} events={} pending={}",
            if self.clip_timer_running { "on" } else { "off" },
            self.events,
            self.pending
        )
    }
}

pub struct Hub {
    catalog: Arc<CatalogStore>,
    loader: CatalogLoader,
    queue: DispatchQueue,
    chat: ConnectionSupervisor<ChatPayload>,
    rewards: Option<RewardLink>,
    clips: Option<Arc<ClipAwarder>>,
    ledger: Arc<dyn Ledger>,
    directory: Arc<dyn UserDirectory>,
    replies: Arc<dyn ReplySink>,
    shutdown: CancellationToken,
    executor: JoinHandle<ExecutorStats>,
}

impl Hub {
    /// Load the catalog, spawn the dispatch loop and build the supervisors.
    /// Nothing is connected yet.
    pub async fn start(deps: HubDeps) -> Self {
        let settings = deps.settings;
        let shutdown = CancellationToken::new();

        let catalog = Arc::new(CatalogStore::empty());
        let loader = CatalogLoader::new(deps.catalog_source, settings.std_timeout());
        catalog.reload(&loader).await;

        let (queue, rx) = dispatch_queue();
        let executor = Executor::new(
            Arc::clone(&catalog),
            Arc::clone(&deps.ledger),
            deps.runtime,
            Arc::clone(&deps.replies),
        )
        .with_action_timeout(settings.action_timeout());
        let loop_shutdown = shutdown.clone();
        let executor = tokio::spawn(async move { executor.run(rx, loop_shutdown).await });

        let chat_router = ChatRouter::new(
            Arc::clone(&catalog),
            Arc::clone(&deps.ledger),
            deps.bot_login.clone(),
            AccrualPolicy {
                points_per_message: settings.points_per_message,
                min_message_len: settings.min_message_len,
            },
        );
        let chat = ConnectionSupervisor::new(
            deps.chat_source,
            Arc::new(chat_router),
            queue.clone(),
            settings.reconnect_delay(),
            shutdown.clone(),
        );

        let rewards = match (deps.reward_source, deps.registrar) {
            (Some(source), Some(registrar)) => {
                let router = Arc::new(RedemptionRouter::new(
                    Arc::clone(&catalog),
                    registrar,
                    deps.broadcaster_id.clone(),
                ));
                let supervisor = ConnectionSupervisor::new(
                    source,
                    router.clone(),
                    queue.clone(),
                    settings.reconnect_delay(),
                    shutdown.clone(),
                );
                Some(RewardLink { supervisor, router })
            }
            (Some(_), None) => {
                warn!("Reward source configured without a topic registrar, rewards disabled");
                None
            }
            _ => {
                info!("No reward source configured, rewards disabled");
                None
            }
        };

        let watermarks = deps.watermarks;
        let clips = deps.clip_feed.map(|feed| {
            let store = watermarks.unwrap_or_else(|| -> Arc<dyn WatermarkStore> {
                info!("No watermark store configured, clip watermark kept in memory");
                Arc::new(MemoryWatermarkStore::default())
            });
            Arc::new(ClipAwarder::new(
                feed,
                Arc::clone(&deps.ledger),
                store,
                deps.bot_login.clone(),
                ClipAwardPolicy {
                    points_per_clip: settings.points_per_clip,
                    initial_delay: settings.clip_initial_delay(),
                    interval: settings.clip_check_interval(),
                },
            ))
        });

        info!(events = catalog.snapshot().len(), "Hub started");
        Self {
            catalog,
            loader,
            queue,
            chat,
            rewards,
            clips,
            ledger: deps.ledger,
            directory: deps.directory,
            replies: deps.replies,
            shutdown,
            executor,
        }
    }

    /// Rebuild the catalog from its source and return its event count.
    /// Requests already queued see the new catalog when they are dequeued.
    pub async fn reload_events(&self) -> usize {
        self.catalog.reload(&self.loader).await
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    /// Producer handle for timer-driven or operator-injected requests.
    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    pub fn chat(&self) -> &ConnectionSupervisor<ChatPayload> {
        &self.chat
    }

    pub fn rewards(&self) -> Option<&ConnectionSupervisor<Redemption>> {
        self.rewards.as_ref().map(|link| &link.supervisor)
    }

    // -----------------------------------------------------------------------
    // Connections
    // -----------------------------------------------------------------------

    pub async fn connect_chat(&self) -> Result<bool> {
        self.chat.connect().await
    }

    pub async fn disconnect_chat(&self) -> Result<bool> {
        self.chat.disconnect().await
    }

    pub async fn connect_rewards(&self) -> Result<bool> {
        match &self.rewards {
            Some(link) => link.supervisor.connect().await,
            None => {
                warn!("Rewards are disabled, not connecting");
                Ok(false)
            }
        }
    }

    pub async fn disconnect_rewards(&self) -> Result<bool> {
        match &self.rewards {
            Some(link) => link.supervisor.disconnect().await,
            None => Ok(false),
        }
    }

    // -----------------------------------------------------------------------
    // Outbound chat
    // -----------------------------------------------------------------------

    /// Returns false without sending while chat is not connected.
    pub async fn send_chat_message(&self, text: &str) -> Result<bool> {
        if !self.chat.is_connected() {
            warn!("Chat is not connected, message not sent");
            return Ok(false);
        }
        self.replies.send_chat_message(text).await?;
        Ok(true)
    }

    pub async fn send_whisper(&self, target: &str, text: &str) -> Result<bool> {
        if !self.chat.is_connected() {
            warn!(recipient = target, "Chat is not connected, whisper not sent");
            return Ok(false);
        }
        self.replies.send_whisper(target, text).await?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Points
    // -----------------------------------------------------------------------

    /// Cost of a chat command, 0 when it does not exist.
    pub fn event_cost(&self, name: &str) -> i64 {
        self.catalog.event_cost(name)
    }

    async fn user_id(&self, login: &str) -> Result<String> {
        self.directory
            .id_for_login(login)
            .await?
            .ok_or_else(|| anyhow!("unknown user '{login}'"))
    }

    /// Apply a signed delta to a user by login; returns the new balance.
    pub async fn add_points(&self, login: &str, delta: i64) -> Result<i64> {
        let user_id = self.user_id(login).await?;
        self.ledger.add_points(&user_id, delta).await
    }

    pub async fn set_points(&self, login: &str, points: i64) -> Result<()> {
        let user_id = self.user_id(login).await?;
        self.ledger.set_points(&user_id, points).await
    }

    pub async fn points(&self, login: &str) -> Result<i64> {
        let user_id = self.user_id(login).await?;
        self.ledger.balance(&user_id).await
    }

    pub async fn all_points(&self) -> Result<Vec<(String, i64)>> {
        self.ledger.all_points().await
    }

    // -----------------------------------------------------------------------
    // Clip timer
    // -----------------------------------------------------------------------

    pub fn start_clip_timer(&self) -> bool {
        match &self.clips {
            Some(clips) => clips.start(&self.shutdown),
            None => {
                warn!("Cannot start clip award timer: no clip feed configured");
                false
            }
        }
    }

    pub fn stop_clip_timer(&self) -> bool {
        match &self.clips {
            Some(clips) => clips.stop(),
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn status(&self) -> HubStatus {
        HubStatus {
            chat: self.chat.state(),
            rewards: self.rewards().map(|s| s.state()),
            topics_healthy: self
                .rewards
                .as_ref()
                .is_some_and(|link| link.router.topics_healthy()),
            clip_timer_running: self.clips.as_ref().is_some_and(|c| c.is_running()),
            events: self.catalog.snapshot().len(),
            pending: self.queue.pending(),
        }
    }

    /// Disconnect everything, stop the dispatch loop and wait for it. An
    /// action already running is allowed to finish.
    pub async fn shutdown(self) -> ExecutorStats {
        info!("Hub shutting down");
        if let Some(clips) = &self.clips {
            if clips.is_running() {
                clips.stop();
            }
        }
        if let Err(e) = self.chat.disconnect().await {
            warn!(error = %e, "Failed to disconnect chat");
        }
        if let Some(link) = &self.rewards {
            if let Err(e) = link.supervisor.disconnect().await {
                warn!(error = %e, "Failed to disconnect rewards");
            }
        }

        self.shutdown.cancel();
        match self.executor.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Dispatch loop task failed");
                ExecutorStats::default()
            }
        }
    }
}
