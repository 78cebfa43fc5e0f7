// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Integration tests for the sink registry: dispatch order, drops,
//! rebinding and timers.

use bootnet::engine::ip4::compute_ipv4_checksum;
use bootnet::engine::registry::RegistryError;
use bootnet::engine::sink::Sink;
use bootnet::engine::sink::SinkId;
use bootnet::engine::storage::OpenMode;
use bootnet::engine::storage::Storage;
use bootnet::engine::tftp::transfer::TftpTransfer;
use bootnet::engine::tftp::transfer::TransferState;
use bootnet_test_utils::*;
use std::time::Duration;

fn transfer(storage: &mut MemStorage, name: &str) -> TftpTransfer {
    let file = storage.open(name, OpenMode::CREATE_TRUNCATE).unwrap();
    TftpTransfer::new(name, name, file, TftpConfig::default()).unwrap()
}

fn client_match(local_port: u16) -> SinkMatch {
    SinkMatch::any()
        .local_ip(CLIENT_IP)
        .proto(Protocol::UDP)
        .remote_ip(SERVER_IP)
        .local_port(local_port)
}

fn to_port(port: u16, body: &[u8]) -> Buffer {
    udp_frame(
        (SERVER_MAC, SERVER_IP, SERVER_PORT),
        (CLIENT_MAC, CLIENT_IP, port),
        body,
    )
}

fn bytes_of<N: bootnet::engine::nic::Nic>(
    reg: &Registry<N>,
    id: SinkId,
) -> u64 {
    reg.sink(id).unwrap().tftp().unwrap().bytes()
}

#[test]
fn first_match_wins() {
    let clock = ManualClock::new(0);
    let mut storage = MemStorage::new();
    let mut reg = client_registry(&clock);

    let narrow = reg
        .register(Sink::new(
            client_match(8200),
            transfer(&mut storage, "a").into(),
        ))
        .unwrap();
    let wide = reg
        .register(Sink::new(
            SinkMatch::any(),
            transfer(&mut storage, "b").into(),
        ))
        .unwrap();

    reg.nic_mut().inject(to_port(8200, &data_body(1, b"for a")));
    reg.nic_mut().inject(to_port(8300, &data_body(1, b"for b!")));
    assert_eq!(reg.pump(), 2);

    assert_eq!(bytes_of(&reg, narrow), 5);
    assert_eq!(bytes_of(&reg, wide), 6);
    assert_eq!(storage.contents("a").unwrap(), b"for a");
    assert_eq!(storage.contents("b").unwrap(), b"for b!");

    let stats = reg.stats();
    assert_eq!(stats.rx_frames, 2);
    assert_eq!(stats.rx_delivered, 2);
    assert_eq!(stats.rx_dropped(), 0);
}

#[test]
fn drops_are_counted() {
    let clock = ManualClock::new(0);
    let mut storage = MemStorage::new();
    let mut reg = client_registry(&clock);
    reg.register(Sink::new(
        client_match(8200),
        transfer(&mut storage, "a").into(),
    ))
    .unwrap();

    // Too short for Ethernet.
    reg.nic_mut().inject_bytes(&[0; 10]);

    // ARP.
    let mut arp = to_port(8200, b"x");
    arp.as_mut_slice()[12..14].copy_from_slice(&[0x08, 0x06]);
    reg.nic_mut().inject(arp);

    // Corrupt IPv4 header checksum.
    let mut bad_csum = to_port(8200, b"x");
    bad_csum.as_mut_slice()[24] ^= 0xFF;
    reg.nic_mut().inject(bad_csum);

    // IPv4 options are not supported.
    let mut ihl = to_port(8200, b"x");
    ihl.as_mut_slice()[14] = 0x46;
    reg.nic_mut().inject(ihl);

    // TCP. The header checksum covers the protocol, so fix it up.
    let mut tcp = to_port(8200, b"x");
    {
        let bytes = tcp.as_mut_slice();
        bytes[23] = 6;
        bytes[24..26].copy_from_slice(&[0, 0]);
        let csum = compute_ipv4_checksum(&bytes[14..34]);
        bytes[24..26].copy_from_slice(&csum.bytes());
    }
    reg.nic_mut().inject(tcp);

    // Corrupt UDP payload.
    let mut bad_udp = to_port(8200, b"payload");
    bad_udp.as_mut_slice()[44] ^= 0x01;
    reg.nic_mut().inject(bad_udp);

    // Valid, but nobody is listening on this port.
    reg.nic_mut().inject(to_port(9999, &data_body(1, b"x")));

    assert_eq!(reg.pump(), 7);
    let stats = reg.stats();
    assert_eq!(stats.rx_frames, 7);
    assert_eq!(stats.rx_bad_ether, 1);
    assert_eq!(stats.rx_not_ipv4, 1);
    assert_eq!(stats.rx_bad_csum, 1);
    assert_eq!(stats.rx_bad_ipv4, 1);
    assert_eq!(stats.rx_not_udp, 1);
    assert_eq!(stats.rx_bad_udp, 1);
    assert_eq!(stats.rx_no_sink, 1);
    assert_eq!(stats.rx_dropped(), 7);
    assert_eq!(stats.rx_delivered, 0);
    assert!(storage.contents("a").unwrap().is_empty());
}

#[test]
fn lock_on_moves_sink_to_end() {
    let clock = ManualClock::new(0);
    let mut storage = MemStorage::new();
    let mut reg = client_registry(&clock);

    let a = reg
        .register(Sink::new(
            client_match(8200),
            transfer(&mut storage, "a").into(),
        ))
        .unwrap();
    let b = reg
        .register(Sink::new(
            client_match(8300),
            transfer(&mut storage, "b").into(),
        ))
        .unwrap();
    assert_eq!(reg.sink_ids(), [a, b]);

    reg.fire(a).unwrap();
    reg.nic_mut().inject(to_port(8200, &oack_body(&[("blksize", "1024")])));
    reg.pump();

    assert_eq!(reg.sink_ids(), [b, a]);
    let sink = reg.sink(a).unwrap();
    assert_eq!(sink.id(), a);
    assert_eq!(sink.smatch().remote_port, Some(SERVER_PORT));
    assert_eq!(sink.tftp().unwrap().state(), TransferState::Transferring);

    // Traffic from another port of the same server no longer matches.
    let stray = udp_frame(
        (SERVER_MAC, SERVER_IP, SERVER_PORT + 1),
        (CLIENT_MAC, CLIENT_IP, 8200),
        &data_body(1, b"nope"),
    );
    reg.nic_mut().inject(stray);
    reg.pump();
    assert_eq!(reg.stats().rx_no_sink, 1);
    assert_eq!(bytes_of(&reg, a), 0);
}

#[test]
fn timers_fire_at_deadline() {
    let clock = ManualClock::new(10_000);
    let mut storage = MemStorage::new();
    let mut reg = client_registry(&clock);
    let id = reg
        .register(Sink::new(
            client_match(8200),
            transfer(&mut storage, "a").into(),
        ))
        .unwrap();

    reg.fire(id).unwrap();
    let tx = reg.nic_mut().take_tx_decoded();
    assert_eq!(tx.len(), 1);
    assert_eq!(tx[0].dst_port, TFTP_SERVER_PORT);
    assert_eq!(tx[0].dst_mac, SERVER_MAC);
    assert_eq!(
        reg.sink(id).unwrap().timer(),
        Some(Moment::from_millis(11_000))
    );

    clock.advance(Duration::from_millis(999));
    reg.pump();
    assert!(reg.nic_mut().take_tx().is_empty());
    assert_eq!(reg.stats().timers_fired, 0);

    clock.advance(Duration::from_millis(1));
    reg.pump();
    let tx = reg.nic_mut().take_tx_decoded();
    assert_eq!(tx.len(), 1);
    assert!(matches!(tx[0].tftp(), TftpMsg::Rrq { .. }));
    assert_eq!(reg.stats().timers_fired, 1);
    assert_eq!(reg.stats().tx_frames, 2);
}

#[test]
fn frames_beat_timers() {
    let clock = ManualClock::new(0);
    let mut storage = MemStorage::new();
    let mut reg = client_registry(&clock);
    let id = reg
        .register(Sink::new(
            client_match(8200),
            transfer(&mut storage, "a").into(),
        ))
        .unwrap();
    reg.fire(id).unwrap();
    reg.nic_mut().take_tx();

    // The reply arrives, but the pump only runs after the deadline.
    clock.advance(Duration::from_millis(5_000));
    reg.nic_mut().inject(to_port(8200, &oack_body(&[("windowsize", "4")])));
    reg.pump();

    let tx = reg.nic_mut().take_tx_decoded();
    assert_eq!(tx.len(), 1);
    assert_eq!(tx[0].ack_block(), 0);
    assert_eq!(tx[0].dst_port, SERVER_PORT);
    assert_eq!(reg.stats().timers_fired, 0);
    assert_eq!(
        reg.sink(id).unwrap().timer(),
        Some(Moment::from_millis(5_250))
    );
}

#[test]
fn capacity_and_unregister() {
    let clock = ManualClock::new(0);
    let mut storage = MemStorage::new();
    let cfg = RegistryConfig { max_sinks: 1, ..client_cfg() };
    let nic = LoopbackNic::new(CLIENT_MAC);
    let mut reg = Registry::new(nic, cfg, test_providers(&clock));

    let a = reg
        .register(Sink::new(
            client_match(8200),
            transfer(&mut storage, "a").into(),
        ))
        .unwrap();
    let err = reg
        .register(Sink::new(
            client_match(8300),
            transfer(&mut storage, "b").into(),
        ))
        .unwrap_err();
    assert_eq!(err, RegistryError::MaxCapacity { limit: 1 });

    let sink = reg.unregister(a).unwrap();
    assert_eq!(sink.id(), a);
    assert!(reg.is_empty());
    assert!(reg.unregister(a).is_none());
    assert_eq!(reg.fire(a), Err(RegistryError::NoSuchSink { id: a }));

    // Ids are never reused.
    let c = reg.register(sink).unwrap();
    assert_ne!(c, a);
}

#[test]
fn dump_and_print() {
    let clock = ManualClock::new(0);
    let mut storage = MemStorage::new();
    let mut reg = client_registry(&clock);
    let id = reg
        .register(Sink::new(
            client_match(8200),
            transfer(&mut storage, "a").into(),
        ))
        .unwrap();
    reg.fire(id).unwrap();

    let dump = reg.dump();
    assert_eq!(dump.len(), 1);
    assert_eq!(dump[0].id, id.as_u64());
    assert_eq!(dump[0].kind, "tftp");
    assert_eq!(dump[0].timer_ms, Some(1_000));
    assert_eq!(
        dump[0].rule,
        "ip.dst=10.0.0.2 ip.proto=UDP ip.src=10.0.0.69 udp.dst=8200 udp.src=*"
    );
    assert!(dump[0].state.starts_with("awaiting-oack a"));

    let mut out = Vec::new();
    bootnet::print::print_sinks_into(&mut out, &dump).unwrap();
    assert!(String::from_utf8(out).unwrap().contains("1000ms"));

    let mut out = Vec::new();
    bootnet::print::print_registry_stats_into(&mut out, &reg.stats())
        .unwrap();
    assert!(String::from_utf8(out).unwrap().contains("tx frames"));
}
