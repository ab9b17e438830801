use std::sync::Arc;

use actionhub_common::EventKey;
use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::catalog::{Catalog, EventDefinition};
use crate::loader::CatalogLoader;

/// Live event catalog with atomic swap for lock-free reads.
///
/// Readers always see one whole catalog, either the one before a reload or
/// the one after it.
pub struct CatalogStore {
    inner: ArcSwap<Catalog>,
    reload_lock: Mutex<()>,
}

impl CatalogStore {
    pub fn new(initial: Catalog) -> Self {
        Self {
            inner: ArcSwap::new(Arc::new(initial)),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Catalog::empty())
    }

    /// Consistent view of the current catalog. Hold the `Arc` for as long as
    /// a stable view is needed; a concurrent reload does not affect it.
    pub fn snapshot(&self) -> Arc<Catalog> {
        self.inner.load_full()
    }

    pub fn lookup(&self, key: &EventKey) -> Option<Arc<EventDefinition>> {
        self.inner.load().lookup(key)
    }

    pub fn contains(&self, key: &EventKey) -> bool {
        self.inner.load().contains(key)
    }

    /// Cost of a chat command, 0 when it does not exist.
    pub fn event_cost(&self, name: &str) -> i64 {
        self.lookup(&EventKey::command(name))
            .map(|def| def.cost)
            .unwrap_or(0)
    }

    pub fn replace(&self, catalog: Catalog) {
        self.inner.store(Arc::new(catalog));
    }

    /// Rebuild the catalog from its source and return its event count.
    ///
    /// Reloads are serialized: a reload requested while another is running
    /// waits for it, then reads the source again.
    pub async fn reload(&self, loader: &CatalogLoader) -> usize {
        let _guard = match self.reload_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Catalog reload in progress, queueing");
                self.reload_lock.lock().await
            }
        };

        let catalog = loader.load().await;
        let count = catalog.len();
        self.replace(catalog);
        info!(events = count, "Event catalog swapped in");
        count
    }
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::empty()
    }
}
