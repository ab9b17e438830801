//! Periodic clip awards: points for every new clip of the channel.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use actionhub_engine::Ledger;

use crate::state::WatermarkStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clip {
    pub id: String,
    pub creator_id: String,
    pub creator_name: String,
    pub created_at: DateTime<Utc>,
}

/// Source of channel clips. Implementations page through the platform API
/// themselves and return every clip created at or after `since`.
#[async_trait]
pub trait ClipFeed: Send + Sync {
    async fn clips_since(&self, since: DateTime<Utc>) -> Result<Vec<Clip>>;
}

#[derive(Debug, Clone)]
pub struct ClipAwardPolicy {
    pub points_per_clip: i64,
    pub initial_delay: Duration,
    pub interval: Duration,
}

/// Credits clip creators on a timer. The watermark only moves forward after
/// a check that fully succeeded, so a failed check is retried next tick.
///
/// The watermark is read from the [`WatermarkStore`] on first use and written
/// back after every successful check.
pub struct ClipAwarder {
    feed: Arc<dyn ClipFeed>,
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn WatermarkStore>,
    bot_login: String,
    policy: ClipAwardPolicy,
    watermark: tokio::sync::Mutex<Option<DateTime<Utc>>>,
    timer: Mutex<Option<CancellationToken>>,
}

impl ClipAwarder {
    pub fn new(
        feed: Arc<dyn ClipFeed>,
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn WatermarkStore>,
        bot_login: impl Into<String>,
        policy: ClipAwardPolicy,
    ) -> Self {
        Self {
            feed,
            ledger,
            store,
            bot_login: bot_login.into(),
            policy,
            watermark: tokio::sync::Mutex::new(None),
            timer: Mutex::new(None),
        }
    }

    /// Start from `watermark` instead of the stored one.
    pub fn with_watermark(self, watermark: DateTime<Utc>) -> Self {
        Self {
            watermark: tokio::sync::Mutex::new(Some(watermark)),
            ..self
        }
    }

    pub async fn watermark(&self) -> DateTime<Utc> {
        let mut watermark = self.watermark.lock().await;
        self.resolve(&mut watermark).await
    }

    async fn resolve(&self, watermark: &mut Option<DateTime<Utc>>) -> DateTime<Utc> {
        if let Some(at) = *watermark {
            return at;
        }
        let at = match self.store.last_clip_check().await {
            Ok(Some(at)) => at,
            Ok(None) => {
                info!("No clip watermark stored, looking back three years");
                first_boot_watermark()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read clip watermark, looking back three years");
                first_boot_watermark()
            }
        };
        *watermark = Some(at);
        at
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Start the timer. Returns false if it was already running.
    pub fn start(self: &Arc<Self>, shutdown: &CancellationToken) -> bool {
        let token = {
            let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
            if timer.as_ref().is_some_and(|token| !token.is_cancelled()) {
                warn!("Clip award timer already running");
                return false;
            }
            let token = shutdown.child_token();
            *timer = Some(token.clone());
            token
        };

        info!(
            interval_mins = self.policy.interval.as_secs() / 60,
            "Clip award timer started"
        );
        tokio::spawn(Arc::clone(self).run(token));
        true
    }

    /// Stop the timer. Returns false if it was not running.
    pub fn stop(&self) -> bool {
        let token = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match token.filter(|token| !token.is_cancelled()) {
            Some(token) => {
                token.cancel();
                info!("Clip award timer stopped");
                true
            }
            None => {
                warn!("Clip award timer is not running");
                false
            }
        }
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut delay = self.policy.initial_delay;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if let Err(e) = self.check_once().await {
                error!(error = %e, "Clip check failed");
            }
            delay = self.policy.interval;
        }
    }

    /// Award every clip created since the watermark, then advance it.
    /// Returns the number of clips that earned points.
    pub async fn check_once(&self) -> Result<usize> {
        let mut watermark = self.watermark.lock().await;
        let since = self.resolve(&mut watermark).await;
        let checked_at = Utc::now();
        info!(since = %since.format("%Y-%m-%dT%H:%M:%S"), "Checking for new clips");

        let mut clips = self.feed.clips_since(since).await?;
        if clips.is_empty() {
            info!("No new clips since last check");
        }
        clips.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut awarded = 0;
        for clip in &clips {
            if clip.creator_name.trim().is_empty() || clip.creator_id.trim().is_empty() {
                continue;
            }
            if clip.creator_name.eq_ignore_ascii_case(&self.bot_login) {
                info!(clip = %clip.id, creator = %clip.creator_name, "Clip by the bot account, skipping");
                continue;
            }
            match self
                .ledger
                .credit(&clip.creator_id, self.policy.points_per_clip)
                .await
            {
                Ok(_) => {
                    info!(
                        clip = %clip.id,
                        creator = %clip.creator_name,
                        points = self.policy.points_per_clip,
                        "Awarded points for clip"
                    );
                    awarded += 1;
                }
                Err(e) => warn!(clip = %clip.id, creator = %clip.creator_name, error = %e, "Failed to award clip points"),
            }
        }

        *watermark = Some(checked_at);
        if let Err(e) = self.store.update_last_clip_check(checked_at).await {
            warn!(error = %e, "Failed to persist clip watermark");
        }
        Ok(awarded)
    }
}

fn first_boot_watermark() -> DateTime<Utc> {
    Utc::now()
        .checked_sub_months(Months::new(36))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
