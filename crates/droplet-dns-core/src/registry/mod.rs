//! Plugin-based inventory source registry
//!
//! The registry allows inventory sources to be registered dynamically at
//! runtime, so the daemon picks a provider by name from configuration
//! instead of hardcoding one.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use droplet_dns_core::registry::SourceRegistry;
//! use droplet_dns_core::ServiceConfig;
//!
//! let registry = SourceRegistry::new();
//! droplet_dns_provider_digitalocean::register(&registry);
//!
//! let config = ServiceConfig::new(token);
//! let source = registry.create_source(&config)?;
//! ```

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::traits::{InventorySource, InventorySourceFactory};
use std::collections::HashMap;
use std::sync::RwLock;

/// Registry of inventory source factories keyed by provider type name
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct SourceRegistry {
    sources: RwLock<HashMap<String, Box<dyn InventorySourceFactory>>>,
}

impl SourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an inventory source factory
    ///
    /// Registering a name twice replaces the earlier factory.
    pub fn register_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn InventorySourceFactory>,
    ) {
        let mut sources = self
            .sources
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sources.insert(name.into(), factory);
    }

    /// Create the inventory source named by `config.provider`
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn InventorySource>)`: Created source instance
    /// - `Err(Error)`: If the provider type is not registered or creation fails
    pub fn create_source(&self, config: &ServiceConfig) -> Result<Box<dyn InventorySource>> {
        let sources = self
            .sources
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let factory = sources.get(config.provider.as_str()).ok_or_else(|| {
            Error::config(format!("Unknown provider type: {}", config.provider))
        })?;

        factory.create(config)
    }

    /// List all registered provider type names
    pub fn list_sources(&self) -> Vec<String> {
        let sources = self
            .sources
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sources.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_source(&self, name: &str) -> bool {
        let sources = self
            .sources
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sources.contains_key(name)
    }
}
