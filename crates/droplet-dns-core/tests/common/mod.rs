//! Test doubles and common utilities for droplet-dns contract tests
//!
//! This module provides a scriptable inventory source and DNS message
//! helpers shared by the contract tests.

#![allow(dead_code)]

use droplet_dns_core::error::{Error, Result};
use droplet_dns_core::traits::{InstancePage, InventorySource, PageRequest};
use droplet_dns_core::{Instance, InstanceStatus, Inventory, ServiceConfig};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;

/// An InventorySource whose pages and failures are controlled by the test
///
/// Clones share all state, so a test keeps one clone for control and hands
/// a boxed clone to the `Inventory`.
#[derive(Clone)]
pub struct ScriptedSource {
    /// Pages returned for page numbers 1..=N
    pages: Arc<Mutex<Vec<Vec<Instance>>>>,
    /// Page number that fails, if any
    fail_on_page: Arc<Mutex<Option<u32>>>,
    /// Delay before each page is returned
    delay: Arc<Mutex<Option<Duration>>>,
    /// Call counter for list_instances()
    calls: Arc<AtomicUsize>,
    /// Page requests in the order they were made
    requests: Arc<Mutex<Vec<PageRequest>>>,
}

impl ScriptedSource {
    /// Create a source returning the given pages
    pub fn new(pages: Vec<Vec<Instance>>) -> Self {
        Self {
            pages: Arc::new(Mutex::new(pages)),
            fail_on_page: Arc::new(Mutex::new(None)),
            delay: Arc::new(Mutex::new(None)),
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a source with everything on one page
    pub fn single_page(instances: Vec<Instance>) -> Self {
        Self::new(vec![instances])
    }

    /// Replace the pages returned by later calls
    pub fn set_pages(&self, pages: Vec<Vec<Instance>>) {
        *self.pages.lock().unwrap() = pages;
    }

    /// Make the given page fail (None = no failures)
    pub fn fail_on_page(&self, page: Option<u32>) {
        *self.fail_on_page.lock().unwrap() = page;
    }

    /// Delay every page by the given duration
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Get the number of times list_instances() was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Get the page requests made so far
    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl InventorySource for ScriptedSource {
    async fn list_instances(&self, request: PageRequest) -> Result<InstancePage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_on_page.lock().unwrap() == Some(request.page) {
            return Err(Error::http(format!("injected failure on page {}", request.page)));
        }

        let pages = self.pages.lock().unwrap();
        let index = request.page as usize - 1;
        let instances = pages.get(index).cloned().unwrap_or_default();
        let next_page = if index + 1 < pages.len() {
            Some(request.page + 1)
        } else {
            None
        };

        Ok(InstancePage::new(instances, next_page))
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A source where every refresh cycle tags all of its instances with the
/// cycle number in the second address octet
///
/// Each cycle spans several pages with yields in between, so a concurrent
/// reader gets plenty of chances to observe a half-built cycle if
/// publication were not atomic.
#[derive(Clone)]
pub struct CycleTaggedSource {
    cycle: Arc<AtomicUsize>,
    pages: u32,
    per_page: u32,
}

impl CycleTaggedSource {
    pub fn new(pages: u32, per_page: u32) -> Self {
        Self {
            cycle: Arc::new(AtomicUsize::new(0)),
            pages,
            per_page,
        }
    }

    /// Total instances produced by one cycle
    pub fn instances_per_cycle(&self) -> usize {
        (self.pages * self.per_page) as usize
    }
}

#[async_trait::async_trait]
impl InventorySource for CycleTaggedSource {
    async fn list_instances(&self, request: PageRequest) -> Result<InstancePage> {
        if request.page == 1 {
            self.cycle.fetch_add(1, Ordering::SeqCst);
        }
        let cycle = self.cycle.load(Ordering::SeqCst) % 250;

        tokio::task::yield_now().await;

        let instances = (0..self.per_page)
            .map(|i| {
                let n = (request.page - 1) * self.per_page + i;
                active(n as u64, &format!("web-{}", n), &format!("10.{}.{}.{}", cycle, n / 250, n % 250))
            })
            .collect();

        let next_page = (request.page < self.pages).then_some(request.page + 1);
        Ok(InstancePage::new(instances, next_page))
    }

    fn source_name(&self) -> &'static str {
        "cycle-tagged"
    }
}

/// An active instance with a public address
pub fn active(id: u64, name: &str, public_ip: &str) -> Instance {
    Instance::new(id, name, InstanceStatus::Active).with_public_ipv4(public_ip)
}

/// An instance with the given status and a public address
pub fn with_status(id: u64, name: &str, status: InstanceStatus, public_ip: &str) -> Instance {
    Instance::new(id, name, status).with_public_ipv4(public_ip)
}

/// Configuration for tests: loopback ephemeral port, 1s refresh
pub fn test_config() -> ServiceConfig {
    ServiceConfig::new("test-token")
        .with_bind_address(SocketAddr::from(([127, 0, 0, 1], 0)))
        .with_refresh_interval_secs(1)
}

/// Build an inventory over the source and run the initial refresh
pub async fn ready_inventory<S>(source: S, config: &ServiceConfig) -> Arc<Inventory>
where
    S: InventorySource + 'static,
{
    let inventory = Inventory::new(Box::new(source), config);
    inventory.refresh().await.expect("initial refresh succeeds");
    Arc::new(inventory)
}

/// Build a standard query message
pub fn build_query(name: &str, record_type: RecordType, id: u16) -> Message {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg
}

/// Extract A addresses from a reply, sorted
pub fn answer_ips(msg: &Message) -> Vec<Ipv4Addr> {
    let mut ips: Vec<Ipv4Addr> = msg
        .answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(a.0),
            _ => None,
        })
        .collect();
    ips.sort();
    ips
}

/// Send a query over UDP and wait up to `wait` for a reply
///
/// Returns `None` when nothing arrives in time.
pub async fn udp_exchange(
    server: SocketAddr,
    name: &str,
    record_type: RecordType,
    id: u16,
    wait: Duration,
) -> Option<Message> {
    let sock = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("failed to bind client socket");

    let bytes = build_query(name, record_type, id).to_vec().unwrap();
    sock.send_to(&bytes, server)
        .await
        .expect("failed to send query");

    let mut buf = vec![0u8; 4096];
    match tokio::time::timeout(wait, sock.recv(&mut buf)).await {
        Ok(Ok(len)) => Some(Message::from_vec(&buf[..len]).expect("failed to parse DNS reply")),
        Ok(Err(e)) => panic!("failed to receive reply: {}", e),
        Err(_) => None,
    }
}
