// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Sinks: the registry's unit of ownership over inbound traffic.
//!
//! A [`Sink`] pairs a [`SinkMatch`] with the protocol state that
//! consumes what it matches. The protocol state is a [`SinkKind`],
//! which dispatches the two events a sink ever sees: a datagram
//! arriving, and its timer expiring. Both are delivered with a
//! [`SinkCtx`], the sink's only way to reach the outside world.

use super::ether::EtherMeta;
use super::ether::EtherType;
use super::ip4::IPV4_HDR_SZ;
use super::ip4::Ipv4Addr;
use super::ip4::Ipv4Meta;
use super::ip4::Protocol;
use super::packet::Buffer;
use super::packet::PacketError;
use super::packet::PacketQueue;
use super::parse::InPkt;
use super::predicate::SinkMatch;
use super::tftp::transfer::TftpTransfer;
use super::udp::UdpHdrRaw;
use super::udp::UdpMeta;
use super::udp::compute_udp_checksum;
use crate::provider::LogProvider;
use crate::time::Moment;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use bootnet_api::MacAddr;
use core::fmt;
use core::fmt::Display;
use core::time::Duration;
use serde::Deserialize;
use serde::Serialize;

/// Bytes of Ethernet, IPv4 and UDP header in front of every datagram
/// body we send.
pub const HDR_ROOM: usize =
    EtherMeta::PAYLOAD_OFFSET + IPV4_HDR_SZ + UdpHdrRaw::SIZE;

/// A registry-assigned sink identifier. Stable across a rebind.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd,
)]
pub struct SinkId(pub(crate) u64);

impl SinkId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The behavior every kind of sink provides.
pub trait SinkHandler {
    /// A datagram matched this sink. The sink now owns it.
    fn on_packet(&mut self, ctx: &mut SinkCtx, pkt: InPkt);

    /// The sink's timer expired. The timer has already been disarmed.
    fn on_timeout(&mut self, ctx: &mut SinkCtx);

    /// A short human-readable description of the protocol state.
    fn state_desc(&self) -> String;
}

/// The protocols a sink can speak.
pub enum SinkKind {
    Tftp(Box<TftpTransfer>),
}

impl SinkKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tftp(_) => "tftp",
        }
    }

    fn handler(&mut self) -> &mut dyn SinkHandler {
        match self {
            Self::Tftp(t) => t.as_mut(),
        }
    }

    pub fn on_packet(&mut self, ctx: &mut SinkCtx, pkt: InPkt) {
        self.handler().on_packet(ctx, pkt)
    }

    pub fn on_timeout(&mut self, ctx: &mut SinkCtx) {
        self.handler().on_timeout(ctx)
    }

    pub fn state_desc(&self) -> String {
        match self {
            Self::Tftp(t) => t.state_desc(),
        }
    }
}

impl From<TftpTransfer> for SinkKind {
    fn from(t: TftpTransfer) -> Self {
        Self::Tftp(Box::new(t))
    }
}

/// A matching rule, a timer, and the protocol state behind them.
pub struct Sink {
    pub(crate) id: SinkId,
    pub(crate) smatch: SinkMatch,
    pub(crate) timer: Option<Moment>,
    pub(crate) kind: SinkKind,
}

impl Sink {
    pub fn new(smatch: SinkMatch, kind: SinkKind) -> Self {
        Self { id: SinkId::default(), smatch, timer: None, kind }
    }

    pub fn id(&self) -> SinkId {
        self.id
    }

    pub fn smatch(&self) -> &SinkMatch {
        &self.smatch
    }

    pub fn timer(&self) -> Option<Moment> {
        self.timer
    }

    pub fn kind(&self) -> &SinkKind {
        &self.kind
    }

    pub fn into_kind(self) -> SinkKind {
        self.kind
    }

    pub fn tftp(&self) -> Option<&TftpTransfer> {
        match &self.kind {
            SinkKind::Tftp(t) => Some(t.as_ref()),
        }
    }

    pub fn into_tftp(self) -> Option<Box<TftpTransfer>> {
        match self.kind {
            SinkKind::Tftp(t) => Some(t),
        }
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Sink")
            .field("id", &self.id)
            .field("smatch", &self.smatch)
            .field("timer", &self.timer)
            .field("kind", &self.kind.name())
            .finish()
    }
}

/// The engine's handle on the world, lent to a sink for the duration
/// of one callback.
pub struct SinkCtx<'a> {
    pub now: Moment,
    pub id: SinkId,
    pub(crate) smatch: SinkMatch,
    pub(crate) rebind: bool,
    pub(crate) timer: &'a mut Option<Moment>,
    pub(crate) egress: &'a mut Egress,
    pub log: &'a dyn LogProvider,
}

impl<'a> SinkCtx<'a> {
    pub fn new(
        now: Moment,
        id: SinkId,
        smatch: SinkMatch,
        timer: &'a mut Option<Moment>,
        egress: &'a mut Egress,
        log: &'a dyn LogProvider,
    ) -> Self {
        Self { now, id, smatch, rebind: false, timer, egress, log }
    }

    /// The sink's match, including any rebind made during this
    /// callback.
    pub fn smatch(&self) -> &SinkMatch {
        &self.smatch
    }

    /// Set the sink's timer to fire `delay` from now.
    pub fn arm(&mut self, delay: Duration) {
        *self.timer = Some(self.now + delay);
    }

    pub fn disarm(&mut self) {
        *self.timer = None;
    }

    pub fn timer(&self) -> Option<Moment> {
        *self.timer
    }

    /// Allocate an outbound datagram with room for `body_len` bytes,
    /// addressed back along the sink's match: to its remote address
    /// and port, from its local port. A wildcard remote address
    /// becomes the local broadcast address.
    pub fn datagram(&self, body_len: usize) -> Result<Datagram, PacketError> {
        Datagram::alloc(
            self.smatch.remote_ip.unwrap_or(Ipv4Addr::LOCAL_BCAST),
            self.smatch.local_port.unwrap_or(0),
            self.smatch.remote_port.unwrap_or(0),
            body_len,
        )
    }

    /// Queue a datagram for transmission once the callback returns.
    pub fn transmit(&mut self, dgram: Datagram) {
        self.egress.send(dgram);
    }

    /// Narrow the sink's match to a single remote port. The registry
    /// applies this by unregistering the sink and registering it again
    /// under the new match once the callback returns.
    pub fn rebind_remote_port(&mut self, port: u16) {
        self.smatch.remote_port = Some(port);
        self.rebind = true;
    }
}

/// An outbound UDP datagram under construction.
///
/// The buffer is allocated with [`HDR_ROOM`] bytes of headroom, which
/// [`Egress`] fills in when the datagram is sent.
#[derive(Debug)]
pub struct Datagram {
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    buf: Buffer,
}

impl Datagram {
    pub fn alloc(
        dst_ip: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
        body_len: usize,
    ) -> Result<Self, PacketError> {
        let len = HDR_ROOM + body_len;
        let mut buf = Buffer::alloc(len)?;
        buf.set_len(len)?;
        Ok(Self { dst_ip, src_port, dst_port, buf })
    }

    pub fn set_dst_port(&mut self, port: u16) {
        self.dst_port = port;
    }

    pub fn body(&self) -> &[u8] {
        &self.buf.as_slice()[HDR_ROOM..]
    }

    pub fn body_mut(&mut self) -> &mut [u8] {
        &mut self.buf.as_mut_slice()[HDR_ROOM..]
    }

    pub fn body_len(&self) -> usize {
        self.buf.len() - HDR_ROOM
    }
}

/// A static IPv4 to MAC mapping.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Neighbour {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}

/// The transmit side of the registry: fills in the lower-layer headers
/// of outbound datagrams and queues the finished frames for the NIC.
#[derive(Debug)]
pub struct Egress {
    local_ip: Ipv4Addr,
    mac: MacAddr,
    ttl: u8,
    ident: u16,
    neighbours: Vec<Neighbour>,
    queue: PacketQueue,
}

impl Egress {
    pub fn new(
        local_ip: Ipv4Addr,
        mac: MacAddr,
        ttl: u8,
        neighbours: Vec<Neighbour>,
    ) -> Self {
        Self {
            local_ip,
            mac,
            ttl,
            ident: 0,
            neighbours,
            queue: PacketQueue::new(),
        }
    }

    pub fn local_ip(&self) -> Ipv4Addr {
        self.local_ip
    }

    /// The MAC to send to for `ip`: a configured neighbour, or
    /// broadcast.
    pub fn resolve(&self, ip: Ipv4Addr) -> MacAddr {
        self.neighbours
            .iter()
            .find(|n| n.ip == ip)
            .map(|n| n.mac)
            .unwrap_or(MacAddr::BROADCAST)
    }

    /// Fill in the Ethernet, IPv4 and UDP headers of `dgram` and queue
    /// the resulting frame.
    pub fn send(&mut self, dgram: Datagram) {
        let Datagram { dst_ip, src_port, dst_port, mut buf } = dgram;
        let udp_len = buf.len() - EtherMeta::PAYLOAD_OFFSET - IPV4_HDR_SZ;
        let bytes = buf.as_mut_slice();

        let eth = EtherMeta {
            dst: self.resolve(dst_ip),
            src: self.mac,
            ether_type: EtherType::Ipv4,
        };
        eth.emit(bytes);

        self.ident = self.ident.wrapping_add(1);
        let ip = Ipv4Meta {
            src: self.local_ip,
            dst: dst_ip,
            proto: Protocol::UDP,
            ttl: self.ttl,
            ident: self.ident,
            total_len: (IPV4_HDR_SZ + udp_len) as u16,
        };
        ip.emit(&mut bytes[EtherMeta::PAYLOAD_OFFSET..]);

        let l4 = &mut bytes[EtherMeta::PAYLOAD_OFFSET + IPV4_HDR_SZ..];
        let udp = UdpMeta {
            src: src_port,
            dst: dst_port,
            len: udp_len as u16,
            csum: [0; 2],
        };
        udp.emit(l4);
        let csum = compute_udp_checksum(&ip, l4);
        l4[6..8].copy_from_slice(&csum);

        self.queue.push_tail(buf);
    }

    /// Take the oldest queued frame.
    pub fn pop_frame(&mut self) -> Option<Buffer> {
        self.queue.pop_head()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::parse::parse_frame;
    use crate::provider::NullLog;

    const ME: Ipv4Addr = Ipv4Addr::from_const([10, 0, 0, 2]);
    const SERVER: Ipv4Addr = Ipv4Addr::from_const([10, 0, 0, 69]);
    const SERVER_MAC: MacAddr = MacAddr::from_const([2, 8, 32, 0, 0, 69]);
    const MY_MAC: MacAddr = MacAddr::from_const([2, 8, 32, 0, 0, 2]);

    fn egress() -> Egress {
        Egress::new(
            ME,
            MY_MAC,
            64,
            vec![Neighbour { ip: SERVER, mac: SERVER_MAC }],
        )
    }

    #[test]
    fn send_fills_headers() {
        let mut eg = egress();
        let mut d = Datagram::alloc(SERVER, 8200, 69, 3).unwrap();
        d.body_mut().copy_from_slice(b"abc");
        eg.send(d);
        assert_eq!(eg.queued(), 1);

        let frame = eg.pop_frame().unwrap();
        assert_eq!(frame.len(), HDR_ROOM + 3);
        let pkt = parse_frame(frame).unwrap();
        assert_eq!(pkt.eth.dst, SERVER_MAC);
        assert_eq!(pkt.eth.src, MY_MAC);
        assert_eq!(pkt.ip.src, ME);
        assert_eq!(pkt.ip.dst, SERVER);
        assert_eq!(pkt.ip.ttl, 64);
        assert_eq!(pkt.udp.src, 8200);
        assert_eq!(pkt.udp.dst, 69);
        assert_ne!(pkt.udp.csum, [0; 2]);
        assert_eq!(pkt.body(), b"abc");
    }

    #[test]
    fn unknown_neighbour_is_broadcast() {
        let eg = egress();
        let stranger = Ipv4Addr::from([10, 0, 0, 99]);
        assert_eq!(eg.resolve(stranger), MacAddr::BROADCAST);
        assert_eq!(eg.resolve(SERVER), SERVER_MAC);
    }

    #[test]
    fn ctx_addresses_along_match() {
        let mut eg = egress();
        let mut timer = None;
        let smatch = SinkMatch::any()
            .local_ip(ME)
            .proto(Protocol::UDP)
            .remote_ip(SERVER)
            .local_port(8200);
        let mut ctx = SinkCtx::new(
            Moment::from_millis(100),
            SinkId(1),
            smatch,
            &mut timer,
            &mut eg,
            &NullLog,
        );

        let d = ctx.datagram(0).unwrap();
        assert_eq!((d.dst_ip, d.src_port, d.dst_port), (SERVER, 8200, 0));

        ctx.rebind_remote_port(1069);
        let d = ctx.datagram(0).unwrap();
        assert_eq!(d.dst_port, 1069);
        assert!(ctx.rebind);

        ctx.arm(Duration::from_millis(250));
        assert_eq!(ctx.timer(), Some(Moment::from_millis(350)));
        ctx.disarm();
        assert_eq!(timer, None);
    }
}
