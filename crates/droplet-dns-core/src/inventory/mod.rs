//! Inventory cache
//!
//! The [`Inventory`] owns the only piece of mutable shared state in the
//! service: a pointer to the current [`InventorySnapshot`].
//!
//! ## Publication
//!
//! ```text
//!  refresh()                                   lookup_by_prefix()
//!  ────────                                    ──────────────────
//!  fetch page 1..N  (local Vec, no lock)
//!  filter active + key by name
//!  build InventorySnapshot
//!  ArcSwap::store ───────────────▶ current ◀── ArcSwap::load_full
//!                                              iterate the Arc'd snapshot
//! ```
//!
//! Readers see either the previous snapshot in full or the new one in full.
//! A failed refresh never reaches the `store` step.

mod snapshot;

pub use snapshot::InventorySnapshot;

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::traits::{InventorySource, PageRequest};

/// Cached view of the provider's active instances
///
/// Shared between the refresh loop and the query path via `Arc<Inventory>`.
pub struct Inventory {
    /// Provider API used to list instances
    source: Box<dyn InventorySource>,

    /// Currently published snapshot
    current: ArcSwap<InventorySnapshot>,

    /// Serializes refreshes so publication is totally ordered
    writer: Mutex<()>,

    /// Instances requested per page
    page_size: u32,

    /// Deadline for one complete fetch
    fetch_timeout: Duration,
}

impl Inventory {
    /// Create an inventory with an empty placeholder snapshot
    ///
    /// Nothing is fetched until [`Inventory::refresh`] is called.
    pub fn new(source: Box<dyn InventorySource>, config: &ServiceConfig) -> Self {
        Self {
            source,
            current: ArcSwap::from_pointee(InventorySnapshot::empty()),
            writer: Mutex::new(()),
            page_size: config.page_size,
            fetch_timeout: config.fetch_timeout(),
        }
    }

    /// Override the fetch deadline
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Fetch the complete instance list and publish a new snapshot
    ///
    /// On any error (a failed page, broken pagination, or the deadline
    /// elapsing) the current snapshot is left untouched and the error is
    /// returned.
    pub async fn refresh(&self) -> Result<()> {
        let _writer = self.writer.lock().await;

        let instances = tokio::time::timeout(self.fetch_timeout, self.fetch_all())
            .await
            .map_err(|_| Error::Timeout(self.fetch_timeout))??;

        let fetched = instances.len();
        let generation = self.current.load().generation() + 1;
        let snapshot = InventorySnapshot::from_instances(generation, instances);

        info!(
            source = self.source.source_name(),
            generation,
            fetched,
            active = snapshot.len(),
            refreshed_at = ?snapshot.refreshed_at(),
            "Inventory refreshed"
        );

        self.current.store(Arc::new(snapshot));
        Ok(())
    }

    /// Every cached instance whose name starts with `prefix`
    ///
    /// Takes a reference to the current snapshot and iterates it without
    /// holding any lock. Order is unspecified.
    pub fn lookup_by_prefix(&self, prefix: &str) -> Vec<Instance> {
        self.current.load_full().lookup_by_prefix(prefix)
    }

    /// The currently published snapshot
    pub fn snapshot(&self) -> Arc<InventorySnapshot> {
        self.current.load_full()
    }

    /// Whether at least one refresh has succeeded
    pub fn is_ready(&self) -> bool {
        self.current.load().generation() > 0
    }

    /// Number of cached instances
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    /// Whether the cache holds no instances
    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// Name of the underlying source (for logging)
    pub fn source_name(&self) -> &'static str {
        self.source.source_name()
    }

    /// Walk all pages of the listing into a local vector
    async fn fetch_all(&self) -> Result<Vec<Instance>> {
        let mut request = PageRequest::first(self.page_size);
        let mut instances = Vec::new();

        loop {
            let page = self.source.list_instances(request).await?;
            debug!(
                page = request.page,
                count = page.instances.len(),
                next = ?page.next_page,
                "Fetched inventory page"
            );

            instances.extend(page.instances);

            match page.next_page {
                None => break,
                Some(next) if next <= request.page => {
                    return Err(Error::pagination(format!(
                        "{} returned next page {} after page {}",
                        self.source.source_name(),
                        next,
                        request.page
                    )));
                }
                Some(next) => request = request.at(next),
            }
        }

        Ok(instances)
    }
}

impl std::fmt::Debug for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.current.load();
        f.debug_struct("Inventory")
            .field("source", &self.source.source_name())
            .field("generation", &snapshot.generation())
            .field("instances", &snapshot.len())
            .field("page_size", &self.page_size)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}
