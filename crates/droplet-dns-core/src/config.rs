//! Configuration types for droplet-dns
//!
//! The configuration is built once at startup (see the `droplet-dnsd` crate)
//! and never mutated afterwards.

use hickory_proto::rr::Name;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Largest page size the DigitalOcean API accepts
pub const MAX_PAGE_SIZE: u32 = 200;

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Inventory provider type name (e.g., "digitalocean")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// API credential for the inventory provider
    /// ⚠️ NEVER log this value
    pub api_token: String,

    /// Base URL of the provider API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Zone suffix this service answers for (e.g., "droplet-lb.")
    #[serde(default = "default_zone")]
    pub zone: String,

    /// TTL of every A record in a reply (seconds)
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Which instance address is served
    #[serde(default)]
    pub address_family: AddressFamily,

    /// UDP address the DNS listener binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Period of the background inventory refresh (seconds)
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Deadline for one complete inventory fetch, all pages included (seconds)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Number of instances requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// What to do when a matched instance has no usable address
    #[serde(default)]
    pub address_error_policy: AddressErrorPolicy,

    /// Capacity of the server event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ServiceConfig {
    /// Create a configuration with defaults and the given API token
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            provider: default_provider(),
            api_token: api_token.into(),
            api_base_url: default_api_base_url(),
            zone: default_zone(),
            ttl: default_ttl(),
            address_family: AddressFamily::default(),
            bind_address: default_bind_address(),
            refresh_interval_secs: default_refresh_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            page_size: default_page_size(),
            address_error_policy: AddressErrorPolicy::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Set the zone suffix
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = zone.into();
        self
    }

    /// Set the record TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the address family
    pub fn with_address_family(mut self, family: AddressFamily) -> Self {
        self.address_family = family;
        self
    }

    /// Set the bind address
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the refresh interval
    pub fn with_refresh_interval_secs(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = secs;
        self
    }

    /// Set the address error policy
    pub fn with_address_error_policy(mut self, policy: AddressErrorPolicy) -> Self {
        self.address_error_policy = policy;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_token.is_empty() {
            return Err(crate::Error::config("API token cannot be empty"));
        }

        if self.provider.is_empty() {
            return Err(crate::Error::config("Provider type cannot be empty"));
        }

        self.zone_name()?;

        if self.refresh_interval_secs == 0 {
            return Err(crate::Error::config("Refresh interval must be > 0"));
        }

        if self.fetch_timeout_secs == 0 {
            return Err(crate::Error::config("Fetch timeout must be > 0"));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(crate::Error::config(format!(
                "Page size must be between 1 and {}. Got: {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        Ok(())
    }

    /// Parse the zone suffix as an absolute DNS name
    ///
    /// A missing trailing dot is added, so "droplet-lb" and "droplet-lb."
    /// name the same zone.
    pub fn zone_name(&self) -> Result<Name, crate::Error> {
        let zone = self.zone.trim();
        if zone.is_empty() || zone == "." {
            return Err(crate::Error::config("Zone cannot be empty or the root"));
        }

        let mut name = Name::from_ascii(zone)
            .map_err(|e| crate::Error::config(format!("Invalid zone '{}': {}", zone, e)))?;
        name.set_fqdn(true);
        Ok(name)
    }

    /// Refresh interval as a Duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Fetch deadline as a Duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Address family served in replies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// The instance's public IPv4 address
    #[default]
    Public,
    /// The instance's private (VPC) IPv4 address
    Private,
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Public => f.write_str("public"),
            AddressFamily::Private => f.write_str("private"),
        }
    }
}

/// Policy applied when a matched instance has no usable address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressErrorPolicy {
    /// Stop adding answers at the first bad instance; answers already
    /// gathered are still sent
    #[default]
    Abort,
    /// Leave out only the bad instance and keep going
    Skip,
}

impl std::str::FromStr for AddressErrorPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(AddressErrorPolicy::Abort),
            "skip" => Ok(AddressErrorPolicy::Skip),
            other => Err(crate::Error::config(format!(
                "Unknown address error policy '{}'. Valid: abort, skip",
                other
            ))),
        }
    }
}

fn default_provider() -> String {
    "digitalocean".to_string()
}

fn default_api_base_url() -> String {
    "https://api.digitalocean.com/v2".to_string()
}

fn default_zone() -> String {
    "droplet-lb.".to_string()
}

fn default_ttl() -> u32 {
    30
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8053))
}

fn default_refresh_interval_secs() -> u64 {
    60
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_event_channel_capacity() -> usize {
    1000
}
