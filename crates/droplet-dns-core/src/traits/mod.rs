//! Core traits for droplet-dns
//!
//! This module defines the abstract interfaces that provider implementations must follow.
//!
//! - [`InventorySource`]: List compute instances from a cloud provider API

pub mod inventory_source;

pub use inventory_source::{InstancePage, InventorySource, InventorySourceFactory, PageRequest};
