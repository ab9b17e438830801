//! End-to-end: scripted sources → hub → dispatch loop → mock runtime.

mod harness;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actionhub_common::{Settings, UserRole};
use actionhub_engine::testing::{MockRuntime, RecordingLedger, RecordingReplies, StaticDirectory};
use actionhub_engine::{FileCatalogSource, MemoryLedger};
use actionhub_supervisor::{ChatPayload, ChatSender, ConnectionState, Hub, HubDeps, Redemption};
use tempfile::TempDir;

use harness::{eventually, ScriptedSource, StaticRegistrar};

const EVENTS: &str = r#"
[hug]
kind = "command"
action = "hug"
timeout = 5000

[superjump]
kind = "command"
action = "superjump"
timeout = -1
cost = 100

[ban]
kind = "command"
action = "ban"
perm = "moderator"
timeout = -1

["Hydrate!"]
kind = "reward"
action = "drink"
"#;

struct World {
    hub: Hub,
    chat: Arc<ScriptedSource<ChatPayload>>,
    rewards: Arc<ScriptedSource<Redemption>>,
    registrar: Arc<StaticRegistrar>,
    runtime: Arc<MockRuntime>,
    replies: Arc<RecordingReplies>,
    ledger: Arc<RecordingLedger>,
    events_path: PathBuf,
    _dir: TempDir,
}

impl World {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let events_path = dir.path().join("events.toml");
        std::fs::write(&events_path, EVENTS).unwrap();

        let directory = Arc::new(
            StaticDirectory::new()
                .with_user("1", "alice")
                .with_user("2", "bob")
                .with_user("9", "actionbot"),
        );
        let ledger = Arc::new(RecordingLedger::new(Arc::new(MemoryLedger::new(
            directory.clone(),
        ))));
        let chat = Arc::new(ScriptedSource::new("chat"));
        let rewards = Arc::new(ScriptedSource::new("rewards"));
        let registrar = Arc::new(StaticRegistrar::enabled());
        let runtime = Arc::new(MockRuntime::new());
        let replies = Arc::new(RecordingReplies::new());

        let deps = HubDeps::builder()
            .settings(Settings::default())
            .bot_login("actionbot".to_string())
            .broadcaster_id(Some("9".to_string()))
            .catalog_source(Arc::new(FileCatalogSource::new(events_path.clone())))
            .chat_source(chat.clone())
            .reward_source(rewards.clone())
            .registrar(registrar.clone())
            .ledger(ledger.clone())
            .directory(directory)
            .runtime(runtime.clone())
            .replies(replies.clone())
            .build();

        Self {
            hub: Hub::start(deps).await,
            chat,
            rewards,
            registrar,
            runtime,
            replies,
            ledger,
            events_path,
            _dir: dir,
        }
    }

    fn say(&self, sender: &ChatSender, line: &str) {
        self.chat.emit(ChatPayload::from_line(sender.clone(), line));
    }
}

fn alice() -> ChatSender {
    ChatSender::viewer("1", "alice")
}

/// Let the dispatch loop drain whatever is queued.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

// ---------------------------------------------------------------------------
// Chat commands
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn chat_command_runs_action_and_cooldown_holds() {
    let w = World::new().await;
    assert!(w.hub.connect_chat().await.unwrap());

    w.say(&alice(), "!hug bob");
    eventually(|| w.runtime.call_count() == 1).await;
    let (action, invocation) = w.runtime.calls().remove(0);
    assert_eq!(action, "hug");
    assert_eq!(invocation.args, vec!["bob"]);

    w.say(&alice(), "!hug bob");
    settle().await;
    assert_eq!(w.runtime.call_count(), 1, "second hug is on cooldown");

    tokio::time::sleep(Duration::from_secs(6)).await;
    w.say(&alice(), "!hug bob");
    eventually(|| w.runtime.call_count() == 2).await;
}

#[tokio::test(start_paused = true)]
async fn paid_command_after_accrual_and_grant() {
    let w = World::new().await;
    w.hub.connect_chat().await.unwrap();

    w.say(&alice(), "hello everyone in chat");
    eventually(|| w.ledger.deltas() == vec![("1".to_string(), 2)]).await;

    w.say(&alice(), "!superjump");
    eventually(|| w.replies.messages().len() == 1).await;
    let reply = &w.replies.messages()[0];
    assert!(reply.contains("100") && reply.contains('2'), "{reply}");
    assert_eq!(w.runtime.call_count(), 0);

    assert_eq!(w.hub.add_points("alice", 98).await.unwrap(), 100);
    w.say(&alice(), "!superjump");
    eventually(|| w.ledger.debits().len() == 1).await;
    assert_eq!(w.runtime.actions(), vec!["superjump"]);
    assert_eq!(w.hub.points("alice").await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn unauthorized_command_is_silent() {
    let w = World::new().await;
    w.hub.connect_chat().await.unwrap();

    w.say(&alice().subscriber().vip(), "!ban bob");
    settle().await;
    assert_eq!(w.runtime.call_count(), 0);
    assert!(w.replies.messages().is_empty());

    w.say(&alice().with_role(UserRole::Moderator), "!ban bob");
    eventually(|| w.runtime.actions() == vec!["ban"]).await;
}

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn reward_redemption_registers_topics_and_runs_action() {
    let w = World::new().await;
    assert!(w.hub.connect_rewards().await.unwrap());
    eventually(|| w.registrar.registered().len() == 1).await;
    assert_eq!(w.registrar.registered()[0].condition["broadcaster_user_id"], "9");
    assert!(w.hub.status().topics_healthy);

    w.rewards.emit(Redemption {
        reward_title: "Hydrate!".into(),
        user_id: "2".into(),
        user_login: "bob".into(),
        user_input: "sparkling".into(),
    });
    eventually(|| w.runtime.actions() == vec!["drink"]).await;
    assert_eq!(w.runtime.calls()[0].1.args, vec!["sparkling"]);
}

// ---------------------------------------------------------------------------
// Catalog reload
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn reload_swaps_the_catalog() {
    let w = World::new().await;
    w.hub.connect_chat().await.unwrap();
    assert_eq!(w.hub.event_cost("superjump"), 100);
    assert_eq!(w.hub.event_cost("nope"), 0);

    std::fs::write(
        &w.events_path,
        "[superjump]\nkind = \"command\"\naction = \"superjump\"\ncost = 250\n",
    )
    .unwrap();
    assert_eq!(w.hub.reload_events().await, 1);
    assert_eq!(w.hub.event_cost("superjump"), 250);

    w.say(&alice(), "!hug bob");
    settle().await;
    assert_eq!(w.runtime.call_count(), 0, "hug no longer exists");
}

#[tokio::test(start_paused = true)]
async fn broken_reload_leaves_an_empty_catalog() {
    let w = World::new().await;
    std::fs::write(&w.events_path, "[hug]\nkind = \"dance\"\naction = \"hug\"\n").unwrap();
    assert_eq!(w.hub.reload_events().await, 0);
    assert_eq!(w.hub.status().events, 0);
}

// ---------------------------------------------------------------------------
// Points, replies, lifecycle
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn points_by_login() {
    let w = World::new().await;
    w.hub.set_points("bob", 40).await.unwrap();
    assert_eq!(w.hub.add_points("alice", 5).await.unwrap(), 5);
    assert_eq!(w.hub.points("bob").await.unwrap(), 40);
    assert_eq!(
        w.hub.all_points().await.unwrap(),
        vec![("alice".to_string(), 5), ("bob".to_string(), 40)]
    );
    assert!(w.hub.add_points("nobody", 5).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn outbound_chat_requires_a_connection() {
    let w = World::new().await;
    assert!(!w.hub.send_chat_message("hi").await.unwrap());

    w.hub.connect_chat().await.unwrap();
    assert!(w.hub.send_chat_message("hi").await.unwrap());
    assert!(w.hub.send_whisper("bob", "psst").await.unwrap());
    assert_eq!(w.replies.messages(), vec!["hi"]);
    assert_eq!(
        w.replies.whispers(),
        vec![("bob".to_string(), "psst".to_string())]
    );

    w.hub.disconnect_chat().await.unwrap();
    assert!(!w.hub.send_chat_message("hi").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn status_and_shutdown() {
    let w = World::new().await;
    assert!(!w.hub.start_clip_timer(), "no clip feed configured");

    w.hub.connect_chat().await.unwrap();
    let status = w.hub.status();
    assert_eq!(status.chat, ConnectionState::Connected);
    assert_eq!(status.rewards, Some(ConnectionState::Disconnected));
    assert_eq!(status.events, 4);
    assert!(status.to_string().starts_with("chat=connected rewards=disconnected"));

    w.say(&alice(), "!hug");
    eventually(|| w.runtime.call_count() == 1).await;

    let stats = w.hub.shutdown().await;
    assert_eq!(stats.executed, 1);
    assert_eq!(w.chat.disconnects(), 1);
}
