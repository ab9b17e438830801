//! Reward redemption routing and redemption topic registration.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use actionhub_common::EventKey;
use actionhub_engine::{CatalogStore, EventInvocationRequest};
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::source::Redemption;
use crate::supervisor::PayloadRouter;

pub const REDEMPTION_TOPIC: &str = "channel.channel_points_custom_reward_redemption.add";
pub const REDEMPTION_TOPIC_VERSION: &str = "1";

/// A topic the reward source must be subscribed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSubscription {
    pub topic: String,
    pub version: String,
    pub condition: BTreeMap<String, String>,
}

impl TopicSubscription {
    pub fn redemptions(broadcaster_id: &str) -> Self {
        Self {
            topic: REDEMPTION_TOPIC.to_string(),
            version: REDEMPTION_TOPIC_VERSION.to_string(),
            condition: BTreeMap::from([(
                "broadcaster_user_id".to_string(),
                broadcaster_id.to_string(),
            )]),
        }
    }
}

/// Registers topic subscriptions with the platform. Returns the status the
/// platform reported for each created subscription.
#[async_trait]
pub trait TopicRegistrar: Send + Sync {
    async fn register(&self, subscription: &TopicSubscription) -> Result<Vec<String>>;
}

fn status_is_live(status: &str) -> bool {
    matches!(status, "enabled" | "webhook_callback_verification_pending")
}

/// Statuses that are neither live nor clearly failed are logged but tolerated.
fn status_is_failure(status: &str) -> bool {
    status.contains("fail") || status.contains("revoked") || status.contains("error")
}

pub struct RedemptionRouter {
    catalog: Arc<CatalogStore>,
    registrar: Arc<dyn TopicRegistrar>,
    broadcaster_id: Option<String>,
    topics_healthy: AtomicBool,
}

impl RedemptionRouter {
    pub fn new(
        catalog: Arc<CatalogStore>,
        registrar: Arc<dyn TopicRegistrar>,
        broadcaster_id: Option<String>,
    ) -> Self {
        Self {
            catalog,
            registrar,
            broadcaster_id,
            topics_healthy: AtomicBool::new(false),
        }
    }

    /// True once every topic registration of the latest session succeeded.
    pub fn topics_healthy(&self) -> bool {
        self.topics_healthy.load(Ordering::SeqCst)
    }

    /// Register every topic for the current session. Failures are logged and
    /// reflected in `topics_healthy`; they never end the session.
    pub async fn register_topics(&self) -> bool {
        let Some(broadcaster_id) = self.broadcaster_id.as_deref() else {
            error!("Cannot register reward topics: broadcaster id is missing");
            self.topics_healthy.store(false, Ordering::SeqCst);
            return false;
        };

        let subscription = TopicSubscription::redemptions(broadcaster_id);
        let healthy = self.register_one(&subscription).await;
        self.topics_healthy.store(healthy, Ordering::SeqCst);
        healthy
    }

    async fn register_one(&self, subscription: &TopicSubscription) -> bool {
        info!(
            topic = %subscription.topic,
            version = %subscription.version,
            "Registering topic"
        );
        let statuses = match self.registrar.register(subscription).await {
            Ok(statuses) => statuses,
            Err(e) => {
                error!(topic = %subscription.topic, error = %e, "Topic registration failed");
                return false;
            }
        };
        if statuses.is_empty() {
            error!(topic = %subscription.topic, "Topic registration returned no subscriptions");
            return false;
        }

        let mut healthy = true;
        for status in &statuses {
            info!(topic = %subscription.topic, status = %status, "Topic subscription status");
            if status_is_live(status) {
                continue;
            }
            warn!(topic = %subscription.topic, status = %status, "Topic subscription is not enabled");
            if status_is_failure(status) {
                healthy = false;
            }
        }
        healthy
    }
}

#[async_trait]
impl PayloadRouter<Redemption> for RedemptionRouter {
    async fn route(&self, redemption: Redemption) -> Option<EventInvocationRequest> {
        let key = EventKey::reward(redemption.reward_title.as_str());
        if !self.catalog.contains(&key) {
            debug!(reward = %redemption.reward_title, "Reward has no event, ignoring");
            return None;
        }

        info!(
            reward = %redemption.reward_title,
            sender = %redemption.user_login,
            "Reward redeemed"
        );
        Some(
            EventInvocationRequest::reward(
                redemption.reward_title,
                redemption.user_id,
                redemption.user_login,
            )
            .with_arg_text(&redemption.user_input),
        )
    }

    async fn on_connected(&self) {
        self.register_topics().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use actionhub_common::PermissionLevel;
    use actionhub_engine::{ActionHandle, Catalog, EventDefinition};

    struct ScriptedRegistrar {
        statuses: Result<Vec<String>, String>,
        seen: Mutex<Vec<TopicSubscription>>,
    }

    impl ScriptedRegistrar {
        fn returning(statuses: &[&str]) -> Self {
            Self {
                statuses: Ok(statuses.iter().map(|s| s.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                statuses: Err("401 unauthorized".to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TopicRegistrar for ScriptedRegistrar {
        async fn register(&self, subscription: &TopicSubscription) -> Result<Vec<String>> {
            self.seen.lock().unwrap().push(subscription.clone());
            self.statuses.clone().map_err(anyhow::Error::msg)
        }
    }

    fn router(registrar: Arc<ScriptedRegistrar>, broadcaster: Option<&str>) -> RedemptionRouter {
        let catalog = Arc::new(CatalogStore::new(Catalog::from_definitions([
            EventDefinition::reward("Hydrate!", ActionHandle::new("drink")),
        ])));
        RedemptionRouter::new(catalog, registrar, broadcaster.map(str::to_string))
    }

    #[tokio::test]
    async fn registers_redemption_topic_for_broadcaster() {
        let registrar = Arc::new(ScriptedRegistrar::returning(&["enabled"]));
        let router = router(registrar.clone(), Some("4242"));

        router.on_connected().await;

        assert!(router.topics_healthy());
        let seen = registrar.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![TopicSubscription::redemptions("4242")]);
        assert_eq!(seen[0].topic, REDEMPTION_TOPIC);
        assert_eq!(seen[0].condition["broadcaster_user_id"], "4242");
    }

    #[tokio::test]
    async fn failed_statuses_mark_topics_unhealthy() {
        for statuses in [
            &["authorization_revoked"][..],
            &["enabled", "verification_failed"][..],
        ] {
            let router = router(Arc::new(ScriptedRegistrar::returning(statuses)), Some("1"));
            assert!(!router.register_topics().await, "{statuses:?}");
            assert!(!router.topics_healthy());
        }
    }

    #[tokio::test]
    async fn unknown_status_is_tolerated() {
        let router = router(
            Arc::new(ScriptedRegistrar::returning(&["pending_review"])),
            Some("1"),
        );
        assert!(router.register_topics().await);
    }

    #[tokio::test]
    async fn registration_errors_and_missing_broadcaster_are_unhealthy() {
        let router_err = router(Arc::new(ScriptedRegistrar::failing()), Some("1"));
        assert!(!router_err.register_topics().await);

        let registrar = Arc::new(ScriptedRegistrar::returning(&["enabled"]));
        let router_missing = router(registrar.clone(), None);
        assert!(!router_missing.register_topics().await);
        assert!(registrar.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn redemption_becomes_viewer_request_with_input_args() {
        let router = router(Arc::new(ScriptedRegistrar::returning(&["enabled"])), Some("1"));
        let request = router
            .route(Redemption {
                reward_title: "Hydrate!".into(),
                user_id: "7".into(),
                user_login: "carol".into(),
                user_input: " sparkling  water ".into(),
            })
            .await
            .unwrap();

        assert_eq!(request.key, EventKey::reward("Hydrate!"));
        assert_eq!(request.permission, PermissionLevel::Viewer);
        assert_eq!(request.args, vec!["sparkling", "water"]);
    }

    #[tokio::test]
    async fn unknown_reward_is_ignored() {
        let router = router(Arc::new(ScriptedRegistrar::returning(&["enabled"])), Some("1"));
        let request = router
            .route(Redemption {
                reward_title: "Something else".into(),
                user_id: "7".into(),
                user_login: "carol".into(),
                user_input: String::new(),
            })
            .await;
        assert!(request.is_none());
    }
}
