//! Compute instance model
//!
//! Instances are produced by an [`InventorySource`](crate::traits::InventorySource)
//! and are read-only from the point of view of the service.

use crate::config::AddressFamily;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Lifecycle status of an instance as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    /// Being provisioned
    New,
    /// Running; the only status served in replies
    Active,
    /// Powered off
    Off,
    /// Destroyed but retained by the provider
    Archive,
    /// Any status this crate does not know about
    #[serde(other)]
    Unknown,
}

/// A cloud compute instance (droplet)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Provider-assigned identifier
    pub id: u64,
    /// Instance name, matched against the leftmost query label
    pub name: String,
    /// Current status
    pub status: InstanceStatus,
    /// Public IPv4 address as reported by the provider
    pub public_ipv4: Option<String>,
    /// Private IPv4 address as reported by the provider
    pub private_ipv4: Option<String>,
}

impl Instance {
    /// Create an instance with no addresses
    pub fn new(id: u64, name: impl Into<String>, status: InstanceStatus) -> Self {
        Self {
            id,
            name: name.into(),
            status,
            public_ipv4: None,
            private_ipv4: None,
        }
    }

    /// Set the public IPv4 address
    pub fn with_public_ipv4(mut self, addr: impl Into<String>) -> Self {
        self.public_ipv4 = Some(addr.into());
        self
    }

    /// Set the private IPv4 address
    pub fn with_private_ipv4(mut self, addr: impl Into<String>) -> Self {
        self.private_ipv4 = Some(addr.into());
        self
    }

    /// Whether this instance participates in the inventory cache
    pub fn is_active(&self) -> bool {
        self.status == InstanceStatus::Active
    }

    /// Resolve the IPv4 address for the given family
    ///
    /// Fails when the provider reported no address of that family or the
    /// reported text is not an IPv4 address.
    pub fn ipv4(&self, family: AddressFamily) -> Result<Ipv4Addr> {
        let raw = match family {
            AddressFamily::Public => self.public_ipv4.as_deref(),
            AddressFamily::Private => self.private_ipv4.as_deref(),
        };

        let raw = raw
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::address(&self.name, format!("no {} IPv4 address", family)))?;

        raw.parse().map_err(|_| {
            Error::address(
                &self.name,
                format!("invalid {} IPv4 address '{}'", family, raw),
            )
        })
    }
}
