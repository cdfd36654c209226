//! DNS query handling
//!
//! Turns one inbound DNS message into zero or one reply, reading only the
//! currently published inventory snapshot.
//!
//! ## Query Flow
//!
//! 1. Not a standard query, or no question → no reply
//! 2. Question outside the zone suffix → no reply
//! 3. Question type other than A → no reply
//! 4. Leftmost label of the name is the lookup key (`web1.droplet-lb.` → `web1`)
//! 5. Every cached instance whose name starts with the key is a match
//! 6. One A record per match, TTL from configuration, authoritative flag set
//!
//! Clients never receive a DNS error code: unsupported questions are
//! dropped, unknown names get an empty answer section.

use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::{AddressErrorPolicy, AddressFamily, ServiceConfig};
use crate::error::Result;
use crate::instance::Instance;
use crate::inventory::Inventory;

/// Stateless handler for inbound DNS queries
#[derive(Debug, Clone)]
pub struct QueryHandler {
    /// Shared inventory cache (read-only here)
    inventory: Arc<Inventory>,

    /// Zone suffix this handler answers for
    zone: Name,

    /// TTL of every answer record
    ttl: u32,

    /// Which instance address goes into answers
    address_family: AddressFamily,

    /// What to do when an instance has no usable address
    error_policy: AddressErrorPolicy,
}

impl QueryHandler {
    /// Create a handler from the service configuration
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: If the zone suffix is not a valid DNS name
    pub fn new(inventory: Arc<Inventory>, config: &ServiceConfig) -> Result<Self> {
        Ok(Self {
            inventory,
            zone: config.zone_name()?,
            ttl: config.ttl,
            address_family: config.address_family,
            error_policy: config.address_error_policy,
        })
    }

    /// Zone suffix this handler answers for
    pub fn zone(&self) -> &Name {
        &self.zone
    }

    /// Handle one DNS message
    ///
    /// # Returns
    ///
    /// - `Some(Message)`: The reply to write back to the client
    /// - `None`: Send nothing
    pub fn handle(&self, request: &Message) -> Option<Message> {
        if request.message_type() != MessageType::Query || request.op_code() != OpCode::Query {
            debug!(
                id = request.id(),
                op_code = ?request.op_code(),
                "Not a standard query, dropping"
            );
            return None;
        }

        let Some(query) = request.queries().first() else {
            debug!(id = request.id(), "Query without a question, dropping");
            return None;
        };

        let name = query.name();
        if !self.zone.zone_of(name) {
            debug!(%name, zone = %self.zone, "Query outside zone, dropping");
            return None;
        }

        if query.query_type() != RecordType::A {
            info!(
                %name,
                query_type = %query.query_type(),
                "Invalid query type, only A (IPv4) is answered"
            );
            return None;
        }

        let key = leftmost_label(name);
        let instances = self.inventory.lookup_by_prefix(&key);
        debug!(%name, key = %key, matches = instances.len(), "Resolved query");

        Some(self.build_reply(request, query, &instances))
    }

    /// Build the reply for an answerable query
    fn build_reply(&self, request: &Message, query: &Query, instances: &[Instance]) -> Message {
        let mut reply = Message::new();
        reply
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(request.op_code())
            .set_authoritative(true)
            .set_recursion_desired(request.recursion_desired())
            .set_checking_disabled(request.checking_disabled())
            .set_response_code(ResponseCode::NoError);
        reply.add_query(query.clone());

        for instance in instances {
            let ip = match instance.ipv4(self.address_family) {
                Ok(ip) => ip,
                Err(e) => {
                    error!(
                        instance = %instance.name,
                        error = %e,
                        policy = ?self.error_policy,
                        "Failed to get instance address"
                    );
                    match self.error_policy {
                        AddressErrorPolicy::Abort => break,
                        AddressErrorPolicy::Skip => continue,
                    }
                }
            };

            reply.add_answer(Record::from_rdata(
                query.name().clone(),
                self.ttl,
                RData::A(A(ip)),
            ));
        }

        reply
    }
}

/// Leftmost label of a name as text, empty for the root
fn leftmost_label(name: &Name) -> String {
    name.iter()
        .next()
        .map(|label| String::from_utf8_lossy(label).into_owned())
        .unwrap_or_default()
}
