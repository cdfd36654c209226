//! Contract Test: Query Handling
//!
//! Constraints verified:
//! - An A query under the zone gets one A record per matching instance
//! - The reply is authoritative and carries the configured TTL
//! - Non-A questions and out-of-zone questions get no reply at all
//! - Unknown names get an empty answer section, never an error code
//! - Address family selection and the bad-address policies
//!
//! If this test fails, clients see wrong answers or unexpected replies.

mod common;

use common::*;
use droplet_dns_core::{AddressErrorPolicy, AddressFamily, Instance, InstanceStatus, QueryHandler};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{DNSClass, RecordType};
use std::net::Ipv4Addr;

#[tokio::test]
async fn a_query_for_single_instance() {
    let config = test_config();
    let inventory = ready_inventory(
        ScriptedSource::single_page(vec![active(1, "web1", "10.0.0.5")]),
        &config,
    )
    .await;
    let handler = QueryHandler::new(inventory, &config).unwrap();

    let reply = handler
        .handle(&build_query("web1.droplet-lb.", RecordType::A, 7))
        .expect("A query under the zone gets a reply");

    assert!(reply.authoritative());
    assert_eq!(reply.id(), 7);
    assert_eq!(reply.answers().len(), 1);

    let record = &reply.answers()[0];
    assert_eq!(record.name().to_ascii(), "web1.droplet-lb.");
    assert_eq!(record.record_type(), RecordType::A);
    assert_eq!(record.dns_class(), DNSClass::IN);
    assert_eq!(answer_ips(&reply), vec![Ipv4Addr::new(10, 0, 0, 5)]);
}

#[tokio::test]
async fn ttl_matches_configuration() {
    let config = test_config().with_ttl(427);
    let inventory = ready_inventory(
        ScriptedSource::single_page(vec![
            active(1, "web1", "10.0.0.1"),
            active(2, "web2", "10.0.0.2"),
        ]),
        &config,
    )
    .await;
    let handler = QueryHandler::new(inventory, &config).unwrap();

    let reply = handler
        .handle(&build_query("web.droplet-lb.", RecordType::A, 1))
        .unwrap();

    assert_eq!(reply.answers().len(), 2);
    assert!(reply.answers().iter().all(|r| r.ttl() == 427));
}

#[tokio::test]
async fn prefix_label_returns_every_match() {
    let config = test_config();
    let inventory = ready_inventory(
        ScriptedSource::single_page(vec![
            active(1, "web1", "10.0.0.1"),
            active(2, "web2", "10.0.0.2"),
            active(3, "api1", "10.0.0.3"),
        ]),
        &config,
    )
    .await;
    let handler = QueryHandler::new(inventory, &config).unwrap();

    let reply = handler
        .handle(&build_query("web.droplet-lb.", RecordType::A, 1))
        .unwrap();

    assert_eq!(
        answer_ips(&reply),
        vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]
    );
    assert!(reply.answers().iter().all(|r| r.name().to_ascii() == "web.droplet-lb."));
}

#[tokio::test]
async fn only_leftmost_label_is_the_key() {
    let config = test_config();
    let inventory = ready_inventory(
        ScriptedSource::single_page(vec![active(1, "web1", "10.0.0.1"), active(2, "edge", "10.0.0.2")]),
        &config,
    )
    .await;
    let handler = QueryHandler::new(inventory, &config).unwrap();

    let reply = handler
        .handle(&build_query("web1.edge.droplet-lb.", RecordType::A, 1))
        .unwrap();

    assert_eq!(answer_ips(&reply), vec![Ipv4Addr::new(10, 0, 0, 1)]);
}

#[tokio::test]
async fn non_a_query_gets_no_reply() {
    let config = test_config();
    let inventory = ready_inventory(
        ScriptedSource::single_page(vec![active(1, "web1", "10.0.0.5")]),
        &config,
    )
    .await;
    let handler = QueryHandler::new(inventory, &config).unwrap();

    for record_type in [RecordType::AAAA, RecordType::TXT, RecordType::MX, RecordType::ANY] {
        let reply = handler.handle(&build_query("web1.droplet-lb.", record_type, 1));
        assert!(reply.is_none(), "{} query must not be answered", record_type);
    }
}

#[tokio::test]
async fn out_of_zone_query_gets_no_reply() {
    let config = test_config();
    let inventory = ready_inventory(
        ScriptedSource::single_page(vec![active(1, "web1", "10.0.0.5")]),
        &config,
    )
    .await;
    let handler = QueryHandler::new(inventory, &config).unwrap();

    assert!(handler.handle(&build_query("web1.example.com.", RecordType::A, 1)).is_none());
    assert!(handler.handle(&build_query("web1.", RecordType::A, 2)).is_none());
}

#[tokio::test]
async fn unknown_name_gets_empty_answer() {
    let config = test_config();
    let inventory = ready_inventory(
        ScriptedSource::single_page(vec![active(1, "web1", "10.0.0.5")]),
        &config,
    )
    .await;
    let handler = QueryHandler::new(inventory, &config).unwrap();

    let reply = handler
        .handle(&build_query("nomatch.droplet-lb.", RecordType::A, 1))
        .expect("unknown names still get a reply");

    assert!(reply.answers().is_empty());
    assert_eq!(reply.response_code(), ResponseCode::NoError);
    assert!(reply.authoritative());
}

#[tokio::test]
async fn private_address_family() {
    let config = test_config().with_address_family(AddressFamily::Private);
    let instance = Instance::new(1, "web1", InstanceStatus::Active)
        .with_public_ipv4("203.0.113.5")
        .with_private_ipv4("10.10.0.5");
    let inventory = ready_inventory(ScriptedSource::single_page(vec![instance]), &config).await;
    let handler = QueryHandler::new(inventory, &config).unwrap();

    let reply = handler
        .handle(&build_query("web1.droplet-lb.", RecordType::A, 1))
        .unwrap();

    assert_eq!(answer_ips(&reply), vec![Ipv4Addr::new(10, 10, 0, 5)]);
}

#[tokio::test]
async fn abort_policy_stops_at_first_bad_address() {
    let config = test_config().with_address_error_policy(AddressErrorPolicy::Abort);
    let inventory = ready_inventory(
        ScriptedSource::single_page(vec![
            active(1, "web1", "10.0.0.1"),
            Instance::new(2, "web2", InstanceStatus::Active),
            active(3, "web3", "10.0.0.3"),
        ]),
        &config,
    )
    .await;
    let handler = QueryHandler::new(inventory, &config).unwrap();

    let reply = handler
        .handle(&build_query("web.droplet-lb.", RecordType::A, 1))
        .expect("reply is still sent after an address failure");

    // Iteration order is unspecified, so only the bound is fixed: the bad
    // instance never shows up and at most the instances before it do.
    assert!(reply.answers().len() < 3);
    let ips = answer_ips(&reply);
    assert!(ips.iter().all(|ip| *ip == Ipv4Addr::new(10, 0, 0, 1) || *ip == Ipv4Addr::new(10, 0, 0, 3)));
}

#[tokio::test]
async fn skip_policy_drops_only_bad_instance() {
    let config = test_config().with_address_error_policy(AddressErrorPolicy::Skip);
    let inventory = ready_inventory(
        ScriptedSource::single_page(vec![
            active(1, "web1", "10.0.0.1"),
            Instance::new(2, "web2", InstanceStatus::Active).with_public_ipv4("not-an-ip"),
            active(3, "web3", "10.0.0.3"),
        ]),
        &config,
    )
    .await;
    let handler = QueryHandler::new(inventory, &config).unwrap();

    let reply = handler
        .handle(&build_query("web.droplet-lb.", RecordType::A, 1))
        .unwrap();

    assert_eq!(
        answer_ips(&reply),
        vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 3)]
    );
}

#[tokio::test]
async fn handler_reads_latest_snapshot() {
    let config = test_config();
    let source = ScriptedSource::single_page(vec![active(1, "web1", "10.0.0.1")]);
    let control = source.clone();
    let inventory = ready_inventory(source, &config).await;
    let handler = QueryHandler::new(inventory.clone(), &config).unwrap();

    control.set_pages(vec![vec![active(1, "web1", "10.0.0.99")]]);
    inventory.refresh().await.unwrap();

    let reply = handler
        .handle(&build_query("web1.droplet-lb.", RecordType::A, 1))
        .unwrap();
    assert_eq!(answer_ips(&reply), vec![Ipv4Addr::new(10, 0, 0, 99)]);
}
