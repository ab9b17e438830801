use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use actionhub_common::{Config, Settings};
use actionhub_engine::{FileCatalogSource, MemoryLedger};
use actionhub_supervisor::console::{ConsoleChatSource, LocalDirectory, LoggingRuntime, TracingReplies};
use actionhub_supervisor::{FileWatermarkStore, Hub, HubDeps};

#[derive(Parser)]
#[command(name = "actionhub", about = "Chat command and reward dispatcher")]
struct Cli {
    /// Path to the settings TOML file (created with defaults if missing)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Path to the event catalog TOML file
    #[arg(long)]
    events: Option<PathBuf>,

    /// Emit JSON logs
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,actionhub=info"));
    if cli.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("ActionHub starting...");

    // Load config
    let mut config = Config::from_env();
    if let Some(path) = cli.settings {
        config.settings_path = path;
    }
    if let Some(path) = cli.events {
        config.events_path = path;
    }
    config.log_redacted();

    let settings = Settings::load_or_init(&config.settings_path)
        .with_context(|| format!("loading settings from {}", config.settings_path.display()))?;

    if config.has_platform_credentials() {
        warn!("Platform credentials are set but only the console source is available in this build");
    }
    let login = config.login.clone().unwrap_or_else(|| "streamer".to_string());

    let directory = Arc::new(LocalDirectory);
    let deps = HubDeps::builder()
        .settings(settings)
        .bot_login(login.clone())
        .broadcaster_id(config.broadcaster_id.clone())
        .catalog_source(Arc::new(FileCatalogSource::new(config.events_path.clone())))
        .chat_source(Arc::new(ConsoleChatSource::new(login)))
        .ledger(Arc::new(MemoryLedger::new(directory.clone())))
        .directory(directory)
        .runtime(Arc::new(LoggingRuntime))
        .replies(Arc::new(TracingReplies))
        .watermarks(Arc::new(FileWatermarkStore::new(config.state_path.clone())))
        .build();

    let hub = Hub::start(deps).await;
    hub.connect_chat().await?;
    info!("{}", hub.status());
    info!("Type chat lines on stdin; '!name args' triggers a command. Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    let stats = hub.shutdown().await;
    info!("ActionHub stopped. {stats}");
    Ok(())
}
