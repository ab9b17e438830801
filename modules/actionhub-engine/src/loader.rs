//! Event catalog loading.
//!
//! The catalog document is a TOML table keyed by trigger name:
//!
//! ```toml
//! [hug]
//! kind = "command"
//! action = "hug"
//! perm = "viewer"
//! timeout = 5000
//! cost = 0
//! ```
//!
//! A structural error anywhere aborts the whole load and yields an empty
//! catalog. Bad or missing `timeout`/`perm`/`cost` fields fall back to
//! defaults with a warning.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actionhub_common::{EventKind, PermissionLevel};
use async_trait::async_trait;
use toml::Value;
use tracing::{error, info, warn};

use crate::catalog::{ActionHandle, Catalog, EventDefinition};
use crate::error::{CatalogError, CatalogResult};

/// `timeout = -1` disables the cooldown for a command.
const NO_COOLDOWN: i64 = -1;

/// Where catalog text comes from. `Ok(None)` means the catalog does not exist.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn read(&self) -> CatalogResult<Option<String>>;

    /// Human-readable origin for log lines.
    fn describe(&self) -> String;
}

/// Catalog stored in a file on disk.
pub struct FileCatalogSource {
    path: PathBuf,
}

impl FileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    async fn read(&self) -> CatalogResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CatalogError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Catalog text held in memory (tests, embedded defaults).
pub struct StaticCatalogSource {
    text: Option<String>,
}

impl StaticCatalogSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn missing() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn read(&self) -> CatalogResult<Option<String>> {
        Ok(self.text.clone())
    }

    fn describe(&self) -> String {
        "<static>".to_string()
    }
}

/// Turns catalog text into a validated `Catalog`.
#[derive(Clone)]
pub struct CatalogLoader {
    source: Arc<dyn CatalogSource>,
    std_timeout: Duration,
}

impl CatalogLoader {
    pub fn new(source: Arc<dyn CatalogSource>, std_timeout: Duration) -> Self {
        Self {
            source,
            std_timeout,
        }
    }

    /// Load the catalog. Never fails: a missing source gives an empty catalog
    /// with a warning, a structural error gives an empty catalog with an error.
    pub async fn load(&self) -> Catalog {
        let origin = self.source.describe();
        match self.try_load().await {
            Ok(Some(catalog)) => {
                info!(source = %origin, events = catalog.len(), "Event catalog loaded");
                catalog
            }
            Ok(None) => {
                warn!(source = %origin, "Event catalog not found, no events loaded");
                Catalog::empty()
            }
            Err(e) => {
                error!(source = %origin, error = %e, "Event catalog rejected, aborting load");
                Catalog::empty()
            }
        }
    }

    /// Like `load`, but reports why nothing was loaded.
    pub async fn try_load(&self) -> CatalogResult<Option<Catalog>> {
        match self.source.read().await? {
            Some(text) => parse_catalog(&text, self.std_timeout).map(Some),
            None => Ok(None),
        }
    }
}

/// Parse and validate catalog text. All-or-nothing.
pub fn parse_catalog(text: &str, std_timeout: Duration) -> CatalogResult<Catalog> {
    let table: toml::Table = toml::from_str(text)?;
    let mut definitions = Vec::with_capacity(table.len());

    for (name, value) in &table {
        let Value::Table(entry) = value else {
            return Err(CatalogError::NotATable { name: name.clone() });
        };

        let kind = entry
            .get("kind")
            .and_then(parse_kind)
            .ok_or_else(|| CatalogError::InvalidKind { name: name.clone() })?;

        let action = entry
            .get("action")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(ActionHandle::new)
            .ok_or_else(|| CatalogError::MissingAction { name: name.clone() })?;

        let definition = match kind {
            EventKind::Reward => EventDefinition::reward(name.clone(), action),
            EventKind::Command => EventDefinition::command(
                name.clone(),
                action,
                parse_permission(name, entry.get("perm")),
                parse_timeout(name, entry.get("timeout"), std_timeout),
                parse_cost(name, entry.get("cost")),
            ),
        };
        definitions.push(definition);
    }

    Ok(Catalog::from_definitions(definitions))
}

fn parse_kind(value: &Value) -> Option<EventKind> {
    match value {
        Value::Integer(i) => EventKind::from_index(*i),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_timeout(name: &str, value: Option<&Value>, std_timeout: Duration) -> Option<Duration> {
    match value.and_then(Value::as_integer) {
        Some(NO_COOLDOWN) => None,
        Some(ms) if ms >= 0 => Some(Duration::from_millis(ms.unsigned_abs())),
        Some(ms) => {
            warn!(
                event = name,
                timeout = ms,
                default_ms = std_timeout.as_millis() as u64,
                "['timeout'] is not a valid timeout, using default"
            );
            Some(std_timeout)
        }
        None => {
            warn!(
                event = name,
                default_ms = std_timeout.as_millis() as u64,
                "['timeout'] is missing or not a number, using default"
            );
            Some(std_timeout)
        }
    }
}

fn parse_permission(name: &str, value: Option<&Value>) -> PermissionLevel {
    let parsed = match value {
        Some(Value::Integer(i)) => PermissionLevel::from_index(*i),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        warn!(event = name, "['perm'] is not a permission level, using viewer");
        PermissionLevel::Viewer
    })
}

fn parse_cost(name: &str, value: Option<&Value>) -> i64 {
    match value {
        None => 0,
        Some(Value::Integer(cost)) if *cost >= 0 => *cost,
        Some(other) => {
            warn!(event = name, cost = %other, "['cost'] is not a valid cost, using 0");
            0
        }
    }
}
