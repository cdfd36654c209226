// # droplet-dns-core
//
// Core library for the droplet-dns name-resolution service.
//
// droplet-dns answers DNS A queries under a configured zone with the IPv4
// addresses of cloud instances whose names start with the query's leftmost
// label. `web.droplet-lb.` resolves to every active `web*` droplet, which
// gives DNS-based discovery and crude load distribution.
//
// ## Architecture Overview
//
// - **InventorySource**: Trait for listing instances from a provider API, one page at a time
// - **Inventory**: Paginated refresh, active filter, atomically published snapshot
// - **QueryHandler**: Maps one DNS question to zero or more A records
// - **DnsServer**: UDP listener plus the fixed-interval background refresh
// - **SourceRegistry**: Plugin-based registry for inventory providers
//
// ## Design Principles
//
// 1. **Single shared pointer**: the snapshot pointer is the only mutable shared state
// 2. **Readers never wait on the fetch**: refresh builds off to the side and swaps
// 3. **Stale beats empty**: a failed refresh keeps the previous snapshot
// 4. **Silent on unsupported questions**: no DNS error codes are ever sent
// 5. **Library-First**: everything the daemon does is available as a library

pub mod config;
pub mod error;
pub mod instance;
pub mod inventory;
pub mod query;
pub mod registry;
pub mod server;
pub mod traits;

// Re-export core types for convenience
pub use config::{AddressErrorPolicy, AddressFamily, ServiceConfig};
pub use error::{Error, Result};
pub use instance::{Instance, InstanceStatus};
pub use inventory::{Inventory, InventorySnapshot};
pub use query::QueryHandler;
pub use registry::SourceRegistry;
pub use server::{DnsServer, ServerEvent};
pub use traits::{InstancePage, InventorySource, PageRequest};
