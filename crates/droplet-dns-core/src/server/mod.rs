//! DNS server and refresh loop
//!
//! The DnsServer is responsible for:
//! - Receiving DNS datagrams on the bound UDP socket
//! - Handing each datagram to the [`QueryHandler`] on its own task
//! - Running the periodic inventory refresh on a background task
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────────────┐  fixed interval   ┌──────────────┐
//!  │  refresh loop    │──── refresh() ───▶│  Inventory   │
//!  │  (1 task)        │                   │  (ArcSwap)   │
//!  └──────────────────┘                   └──────┬───────┘
//!                                                │ lookup_by_prefix()
//!  ┌──────────────────┐  datagram         ┌──────┴───────┐
//!  │  UDP socket      │──── spawn ───────▶│ QueryHandler │──▶ reply
//!  └──────────────────┘  (1 task each)    └──────────────┘
//! ```
//!
//! ## Refresh Failures
//!
//! A failed periodic refresh is logged and reported as
//! [`ServerEvent::RefreshFailed`]; the previous snapshot keeps being served
//! and the next cycle runs on the normal schedule (no backoff).

use hickory_proto::op::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::inventory::Inventory;
use crate::query::QueryHandler;

/// Largest datagram accepted from clients
const MAX_DATAGRAM_SIZE: usize = 4096;

/// Events emitted by the DnsServer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Server started serving queries
    Started {
        bind_address: SocketAddr,
        instances: usize,
    },

    /// A periodic refresh published a new snapshot
    RefreshSucceeded {
        generation: u64,
        instances: usize,
    },

    /// A periodic refresh failed; the previous snapshot is still served
    RefreshFailed {
        error: String,
    },

    /// Server stopped
    Stopped {
        reason: String,
    },
}

/// UDP DNS server backed by the inventory cache
///
/// ## Lifecycle
///
/// 1. Refresh the [`Inventory`] once (the server refuses an empty cache)
/// 2. Bind with [`DnsServer::bind()`]
/// 3. Serve with [`DnsServer::run()`] until a shutdown signal is received
pub struct DnsServer {
    /// Bound UDP socket, shared with per-query tasks
    socket: Arc<UdpSocket>,

    /// Address the socket is actually bound to
    local_addr: SocketAddr,

    /// Inventory cache refreshed by the background loop
    inventory: Arc<Inventory>,

    /// Query handler shared with per-query tasks
    handler: Arc<QueryHandler>,

    /// Period of the background refresh
    refresh_interval: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ServerEvent>,
}

impl DnsServer {
    /// Bind the UDP listener
    ///
    /// # Parameters
    ///
    /// - `inventory`: Inventory that has completed at least one refresh
    /// - `config`: Service configuration
    ///
    /// # Returns
    ///
    /// A tuple of (server, event_receiver) where event_receiver yields server events
    pub async fn bind(
        inventory: Arc<Inventory>,
        config: &ServiceConfig,
    ) -> Result<(Self, mpsc::Receiver<ServerEvent>)> {
        config.validate()?;

        if !inventory.is_ready() {
            return Err(Error::inventory(
                "Inventory has not been refreshed; refusing to serve an unknown inventory",
            ));
        }

        let handler = QueryHandler::new(Arc::clone(&inventory), config)?;

        let socket = UdpSocket::bind(config.bind_address).await?;
        let local_addr = socket.local_addr()?;
        info!(addr = %local_addr, "DNS UDP listening");

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let server = Self {
            socket: Arc::new(socket),
            local_addr,
            inventory,
            handler: Arc::new(handler),
            refresh_interval: config.refresh_interval(),
            event_tx: tx,
        };

        Ok((server, rx))
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The query handler used for every datagram
    pub fn handler(&self) -> &QueryHandler {
        &self.handler
    }

    /// Run the server until ctrl-c
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the server until the given shutdown signal fires
    ///
    /// With `None` this behaves like [`DnsServer::run()`]. Dropping the
    /// sender also counts as a shutdown signal.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to wait for ctrl-c: {}", e);
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        let (stop_tx, stop_rx) = watch::channel(false);
        let refresh_handle = tokio::spawn(refresh_loop(
            Arc::clone(&self.inventory),
            self.refresh_interval,
            self.event_tx.clone(),
            stop_rx,
        ));

        info!(
            addr = %self.local_addr,
            zone = %self.handler.zone(),
            instances = self.inventory.len(),
            "Serving DNS queries"
        );
        emit_event(
            &self.event_tx,
            ServerEvent::Started {
                bind_address: self.local_addr,
                instances: self.inventory.len(),
            },
        );

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => {
                            let datagram = buf[..len].to_vec();
                            let socket = Arc::clone(&self.socket);
                            let handler = Arc::clone(&self.handler);
                            tokio::spawn(async move {
                                serve_datagram(&handler, &socket, &datagram, peer).await;
                            });
                        }
                        Err(e) => {
                            // Continue serving despite a failed receive
                            warn!("Failed to receive datagram: {}", e);
                        }
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        let _ = stop_tx.send(true);
        if let Err(e) = refresh_handle.await {
            error!("Refresh loop terminated abnormally: {}", e);
        }

        emit_event(
            &self.event_tx,
            ServerEvent::Stopped {
                reason: "Shutdown signal".to_string(),
            },
        );
        info!("DNS server stopped");

        Ok(())
    }
}

/// Periodically refresh the inventory until told to stop
///
/// The first cycle runs one full period after startup; the initial refresh
/// has already happened by the time the server runs.
async fn refresh_loop(
    inventory: Arc<Inventory>,
    period: Duration,
    event_tx: mpsc::Sender<ServerEvent>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = IntervalStream::new(interval);

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,

            tick = ticks.next() => {
                if tick.is_none() {
                    break;
                }

                info!("Refreshing droplets");
                let result = tokio::select! {
                    _ = stop_rx.changed() => break,
                    result = inventory.refresh() => result,
                };

                match result {
                    Ok(()) => {
                        let snapshot = inventory.snapshot();
                        emit_event(&event_tx, ServerEvent::RefreshSucceeded {
                            generation: snapshot.generation(),
                            instances: snapshot.len(),
                        });
                    }
                    Err(e) => {
                        if e.is_transient() {
                            warn!("Inventory refresh failed, keeping previous snapshot: {}", e);
                        } else {
                            error!("Inventory refresh failed, keeping previous snapshot: {}", e);
                        }
                        emit_event(&event_tx, ServerEvent::RefreshFailed {
                            error: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    debug!("Refresh loop stopped");
}

/// Decode one datagram, handle it, and send the reply if there is one
async fn serve_datagram(
    handler: &QueryHandler,
    socket: &UdpSocket,
    datagram: &[u8],
    peer: SocketAddr,
) {
    let request = match decode_request(datagram) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(%peer, "Malformed DNS message, dropping: {}", e);
            return;
        }
    };

    let Some(reply) = handler.handle(&request) else {
        return;
    };

    let bytes = match encode_reply(&reply) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(%peer, id = reply.id(), "Failed to encode reply: {}", e);
            return;
        }
    };

    if let Err(e) = socket.send_to(&bytes, peer).await {
        warn!(%peer, "Failed to send reply: {}", e);
    }
}

/// Parse one datagram as a DNS message
fn decode_request(datagram: &[u8]) -> Result<Message> {
    Ok(Message::from_vec(datagram)?)
}

/// Serialize a reply to wire format
fn encode_reply(reply: &Message) -> Result<Vec<u8>> {
    Ok(reply.to_vec()?)
}

/// Emit a server event
///
/// Drops the event with a warning when the channel is full or closed.
fn emit_event(event_tx: &mpsc::Sender<ServerEvent>, event: ServerEvent) {
    if let Err(e) = event_tx.try_send(event) {
        match e {
            mpsc::error::TrySendError::Full(_) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            mpsc::error::TrySendError::Closed(_) => {
                debug!("Event receiver dropped, discarding event");
            }
        }
    }
}
