// # Inventory Snapshot
//
// Immutable, name-keyed view of the active instances as of one successful
// refresh. A snapshot is built completely before it is published and is
// never modified afterwards, so readers can iterate it without a lock.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::instance::Instance;

/// Point-in-time mapping from instance name to instance
#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    /// Sequence number of this snapshot (0 = nothing fetched yet)
    generation: u64,

    /// When the fetch that produced this snapshot completed
    refreshed_at: Option<DateTime<Utc>>,

    /// Active instances keyed by name
    instances: HashMap<String, Instance>,
}

impl InventorySnapshot {
    /// The placeholder snapshot in effect before the first refresh
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from a complete fetch
    ///
    /// Instances that are not active are dropped. When two active instances
    /// share a name, the one listed later wins.
    pub fn from_instances<I>(generation: u64, instances: I) -> Self
    where
        I: IntoIterator<Item = Instance>,
    {
        let instances = instances
            .into_iter()
            .filter(Instance::is_active)
            .map(|instance| (instance.name.clone(), instance))
            .collect();

        Self {
            generation,
            refreshed_at: Some(Utc::now()),
            instances,
        }
    }

    /// Sequence number of this snapshot
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When this snapshot was fetched, `None` for the placeholder
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Number of active instances
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the snapshot holds no instances
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Look up an instance by exact name
    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.instances.get(name)
    }

    /// Iterate over all instances, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    /// Every instance whose name starts with `prefix`
    ///
    /// Literal, case-sensitive, byte-wise comparison. Order is unspecified.
    pub fn lookup_by_prefix(&self, prefix: &str) -> Vec<Instance> {
        self.instances
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(_, instance)| instance.clone())
            .collect()
    }
}
