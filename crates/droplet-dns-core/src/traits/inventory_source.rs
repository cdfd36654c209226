// # Inventory Source Trait
//
// Defines the interface for listing compute instances via provider APIs.
//
// ## Implementations
//
// - DigitalOcean: `droplet-dns-provider-digitalocean` crate
//
// ## Usage
//
// ```rust,ignore
// use droplet_dns_core::traits::{InventorySource, PageRequest};
//
// #[tokio::main]
// async fn main() -> droplet_dns_core::Result<()> {
//     let source = /* InventorySource implementation */;
//
//     // Fetch the first page
//     let page = source.list_instances(PageRequest::first(200)).await?;
//     println!("{} instances, next page: {:?}", page.instances.len(), page.next_page);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::instance::Instance;

/// Position of one page in a paginated listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page: u32,
    /// Number of instances per page
    pub per_page: u32,
}

impl PageRequest {
    /// Request for the first page
    pub fn first(per_page: u32) -> Self {
        Self { page: 1, per_page }
    }

    /// Request for another page of the same size
    pub fn at(self, page: u32) -> Self {
        Self { page, ..self }
    }
}

/// One page of a paginated instance listing
#[derive(Debug, Clone, Default)]
pub struct InstancePage {
    /// Instances on this page, in provider order, of any status
    pub instances: Vec<Instance>,
    /// Page to request next, `None` when this was the last page
    pub next_page: Option<u32>,
}

impl InstancePage {
    /// Create a page
    pub fn new(instances: Vec<Instance>, next_page: Option<u32>) -> Self {
        Self {
            instances,
            next_page,
        }
    }

    /// Whether the provider signalled that no further pages exist
    pub fn is_last(&self) -> bool {
        self.next_page.is_none()
    }
}

/// Trait for cloud inventory implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Contract
///
/// - One API call per invocation; no retries, no backoff
/// - No caching between calls (the snapshot is owned by `Inventory`)
/// - No filtering by status (done by `Inventory`)
/// - Errors are returned, never logged-and-swallowed
///
/// `Inventory` walks the pages and applies the fetch deadline, so a source
/// only has to answer for a single page.
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Fetch one page of the instance listing
    ///
    /// # Parameters
    ///
    /// - `request`: Page number and page size
    ///
    /// # Returns
    ///
    /// - `Ok(InstancePage)`: The instances on that page and the continuation
    /// - `Err(Error)`: If the request failed
    async fn list_instances(&self, request: PageRequest) -> Result<InstancePage, crate::Error>;

    /// Get the source name (for logging/debugging)
    ///
    /// # Returns
    ///
    /// A static string identifying the provider (e.g., "digitalocean")
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing inventory sources from configuration
pub trait InventorySourceFactory: Send + Sync {
    /// Create an InventorySource instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Service configuration (token, API URL, timeouts)
    ///
    /// # Returns
    ///
    /// A boxed InventorySource trait object
    fn create(
        &self,
        config: &crate::config::ServiceConfig,
    ) -> Result<Box<dyn InventorySource>, crate::Error>;
}
