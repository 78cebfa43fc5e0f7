// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

pub mod nic;
pub mod pcap;
pub mod server;
pub mod storage;

// Let's make our lives easier and pub use a bunch of stuff.
pub use bootnet::api::Ipv4Addr;
pub use bootnet::api::MacAddr;
pub use bootnet::api::RegistryStats;
pub use bootnet::api::TransferStats;
pub use bootnet::engine::console::Console;
pub use bootnet::engine::console::NoConsole;
pub use bootnet::engine::ether::EtherMeta;
pub use bootnet::engine::ether::EtherType;
pub use bootnet::engine::ip4::IPV4_HDR_SZ;
pub use bootnet::engine::ip4::Ipv4Meta;
pub use bootnet::engine::ip4::Protocol;
pub use bootnet::engine::packet::Buffer;
pub use bootnet::engine::parse::InPkt;
pub use bootnet::engine::parse::parse_frame;
pub use bootnet::engine::predicate::SinkMatch;
pub use bootnet::engine::registry::Registry;
pub use bootnet::engine::registry::RegistryConfig;
pub use bootnet::engine::sink::Neighbour;
pub use bootnet::engine::tftp::OP_DATA;
pub use bootnet::engine::tftp::OP_ERROR;
pub use bootnet::engine::tftp::OP_OACK;
pub use bootnet::engine::tftp::TFTP_SERVER_PORT;
pub use bootnet::engine::tftp::TftpConfig;
pub use bootnet::engine::tftp::TftpMsg;
pub use bootnet::engine::udp::UdpHdrRaw;
pub use bootnet::engine::udp::UdpMeta;
pub use bootnet::engine::udp::compute_udp_checksum;
pub use bootnet::provider::LogLevel;
pub use bootnet::provider::LogProvider;
pub use bootnet::provider::NullLog;
pub use bootnet::provider::PrintlnLog;
pub use bootnet::provider::Providers;
pub use bootnet::time::Clock;
pub use bootnet::time::Moment;
pub use nic::LoopbackNic;
pub use server::TftpServer;
pub use storage::MemStorage;

use smoltcp::wire::EthernetFrame;
use smoltcp::wire::IpAddress;
use smoltcp::wire::Ipv4Address;
use smoltcp::wire::Ipv4Packet;
use smoltcp::wire::UdpPacket;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

pub const CLIENT_IP: Ipv4Addr = Ipv4Addr::from_const([10, 0, 0, 2]);
pub const CLIENT_MAC: MacAddr = MacAddr::from_const([2, 8, 32, 0, 0, 2]);
pub const SERVER_IP: Ipv4Addr = Ipv4Addr::from_const([10, 0, 0, 69]);
pub const SERVER_MAC: MacAddr = MacAddr::from_const([2, 8, 32, 0, 0, 69]);
pub const CLIENT_PORT: u16 = 8200;
pub const SERVER_PORT: u16 = 1069;

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one and hand another
/// to a registry. With a non-zero `step`, every reading advances the
/// clock afterwards, which lets a busy-polling loop reach its timeouts.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
    step: u64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self { now: Arc::new(AtomicU64::new(start_ms)), step: 0 }
    }

    pub fn stepping(start_ms: u64, step_ms: u64) -> Self {
        Self { now: Arc::new(AtomicU64::new(start_ms)), step: step_ms }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Moment {
        Moment::from_millis(self.now.fetch_add(self.step, Ordering::SeqCst))
    }
}

/// A log provider that remembers everything, for tests that check what
/// the operator would have seen.
#[derive(Clone, Debug, Default)]
pub struct CaptureLog {
    lines: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl CaptureLog {
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().unwrap().clone()
    }

    /// Was `msg` logged, at any level?
    pub fn contains(&self, msg: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|(_, m)| m == msg)
    }
}

impl LogProvider for CaptureLog {
    fn log(&self, level: LogLevel, msg: &str) {
        self.lines.lock().unwrap().push((level, msg.to_string()));
    }
}

/// Providers for a test registry: quiet logging and `clock`.
pub fn test_providers(clock: &ManualClock) -> Providers {
    Providers { log: Box::new(NullLog), clock: Box::new(clock.clone()) }
}

/// Providers that record the log into `log`.
pub fn capture_providers(clock: &ManualClock, log: &CaptureLog) -> Providers {
    Providers { log: Box::new(log.clone()), clock: Box::new(clock.clone()) }
}

/// The client side of the standard test network.
pub fn client_cfg() -> RegistryConfig {
    RegistryConfig {
        local_ip: CLIENT_IP,
        neighbours: vec![Neighbour { ip: SERVER_IP, mac: SERVER_MAC }],
        ..Default::default()
    }
}

/// A registry for the client on a loopback NIC.
pub fn client_registry(clock: &ManualClock) -> Registry<LoopbackNic> {
    Registry::new(
        LoopbackNic::new(CLIENT_MAC),
        client_cfg(),
        test_providers(clock),
    )
}

/// Build a complete Ethernet/IPv4/UDP frame carrying `body`.
pub fn udp_frame(
    src: (MacAddr, Ipv4Addr, u16),
    dst: (MacAddr, Ipv4Addr, u16),
    body: &[u8],
) -> Buffer {
    let udp_len = UdpHdrRaw::SIZE + body.len();
    let total = EtherMeta::PAYLOAD_OFFSET + IPV4_HDR_SZ + udp_len;
    let mut buf = Buffer::alloc(total).unwrap();
    buf.set_len(total).unwrap();
    let bytes = buf.as_mut_slice();

    EtherMeta { dst: dst.0, src: src.0, ether_type: EtherType::Ipv4 }
        .emit(bytes);

    let ip = Ipv4Meta {
        src: src.1,
        dst: dst.1,
        proto: Protocol::UDP,
        ttl: 64,
        ident: 1,
        total_len: (IPV4_HDR_SZ + udp_len) as u16,
    };
    ip.emit(&mut bytes[EtherMeta::PAYLOAD_OFFSET..]);

    let l4 = &mut bytes[EtherMeta::PAYLOAD_OFFSET + IPV4_HDR_SZ..];
    UdpMeta { src: src.2, dst: dst.2, len: udp_len as u16, csum: [0; 2] }
        .emit(l4);
    l4[UdpHdrRaw::SIZE..].copy_from_slice(body);
    let csum = compute_udp_checksum(&ip, l4);
    l4[6..8].copy_from_slice(&csum);
    buf
}

/// A frame from the test server's transfer port to the client.
pub fn server_frame(body: &[u8]) -> Buffer {
    udp_frame(
        (SERVER_MAC, SERVER_IP, SERVER_PORT),
        (CLIENT_MAC, CLIENT_IP, CLIENT_PORT),
        body,
    )
}

pub fn data_body(block: u16, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + data.len());
    body.extend_from_slice(&OP_DATA.to_be_bytes());
    body.extend_from_slice(&block.to_be_bytes());
    body.extend_from_slice(data);
    body
}

/// An OACK carrying `opts` as `name, value` pairs.
pub fn oack_body(opts: &[(&str, &str)]) -> Vec<u8> {
    let mut body = OP_OACK.to_be_bytes().to_vec();
    for (name, val) in opts {
        body.extend_from_slice(name.as_bytes());
        body.push(0);
        body.extend_from_slice(val.as_bytes());
        body.push(0);
    }
    body
}

pub fn error_body(code: u16, msg: &str) -> Vec<u8> {
    let mut body = OP_ERROR.to_be_bytes().to_vec();
    body.extend_from_slice(&code.to_be_bytes());
    body.extend_from_slice(msg.as_bytes());
    body.push(0);
    body
}

/// A frame the engine transmitted, decoded independently of the
/// engine's own codecs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TxFrame {
    pub dst_mac: MacAddr,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub body: Vec<u8>,
}

impl TxFrame {
    /// Decode the TFTP message this frame carries.
    pub fn tftp(&self) -> TftpMsg<'_> {
        TftpMsg::parse(&self.body).unwrap()
    }

    /// The block number of an ACK; panics on anything else.
    pub fn ack_block(&self) -> u16 {
        match self.tftp() {
            TftpMsg::Ack { block } => block,
            msg => panic!("expected ACK, got {msg:?}"),
        }
    }
}

/// Decode a transmitted frame with smoltcp, checking both checksums.
pub fn decode_tx(frame: &[u8]) -> TxFrame {
    let eth = EthernetFrame::new_checked(frame).unwrap();
    let ip = Ipv4Packet::new_checked(eth.payload()).unwrap();
    assert!(ip.verify_checksum(), "bad IPv4 checksum");

    let src = ip.src_addr();
    let dst = ip.dst_addr();
    let udp = UdpPacket::new_checked(ip.payload()).unwrap();
    assert!(
        udp.verify_checksum(&IpAddress::Ipv4(src), &IpAddress::Ipv4(dst)),
        "bad UDP checksum"
    );

    TxFrame {
        dst_mac: MacAddr::from(eth.dst_addr().0),
        src_ip: Ipv4Addr::from(ipv4_octets(src)),
        dst_ip: Ipv4Addr::from(ipv4_octets(dst)),
        src_port: udp.src_port(),
        dst_port: udp.dst_port(),
        body: udp.payload().to_vec(),
    }
}

fn ipv4_octets(addr: Ipv4Address) -> [u8; 4] {
    let mut octets = [0; 4];
    octets.copy_from_slice(addr.as_bytes());
    octets
}
