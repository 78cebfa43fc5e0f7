// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Classification of inbound frames down the Ethernet, IPv4, UDP
//! chain.

use super::ether::EtherHdrError;
use super::ether::EtherMeta;
use super::ether::EtherType;
use super::ether::decode_ethernet;
use super::ip4::IPV4_HDR_SZ;
use super::ip4::Ipv4HdrError;
use super::ip4::Ipv4Meta;
use super::ip4::Protocol;
use super::ip4::decode_ipv4;
use super::packet::Buffer;
use super::udp::UdpHdrError;
use super::udp::UdpHdrRaw;
use super::udp::UdpMeta;
use super::udp::decode_udp;
use core::fmt;
use core::fmt::Display;

/// Why an inbound frame was not classified as a UDP datagram.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    Ether(EtherHdrError),
    NotIpv4(EtherType),
    Ipv4(Ipv4HdrError),
    NotUdp(Protocol),
    Udp(UdpHdrError),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Ether(e) => write!(f, "ethernet: {e}"),
            Self::NotIpv4(et) => write!(f, "not IPv4: ethertype {et}"),
            Self::Ipv4(e) => write!(f, "ipv4: {e}"),
            Self::NotUdp(proto) => write!(f, "not UDP: protocol {proto}"),
            Self::Udp(e) => write!(f, "udp: {e}"),
        }
    }
}

impl From<EtherHdrError> for ParseError {
    fn from(e: EtherHdrError) -> Self {
        Self::Ether(e)
    }
}

impl From<Ipv4HdrError> for ParseError {
    fn from(e: Ipv4HdrError) -> Self {
        Self::Ipv4(e)
    }
}

impl From<UdpHdrError> for ParseError {
    fn from(e: UdpHdrError) -> Self {
        Self::Udp(e)
    }
}

/// A validated inbound UDP datagram, still in the frame that carried
/// it.
#[derive(Debug)]
pub struct InPkt {
    pub eth: EtherMeta,
    pub ip: Ipv4Meta,
    pub udp: UdpMeta,
    buf: Buffer,
    body_off: usize,
    body_len: usize,
}

impl InPkt {
    /// The UDP payload.
    pub fn body(&self) -> &[u8] {
        &self.buf.as_slice()[self.body_off..self.body_off + self.body_len]
    }

    /// The whole frame as received.
    pub fn frame(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// Give the frame back, e.g. to recycle it.
    pub fn into_buffer(self) -> Buffer {
        self.buf
    }
}

/// Classify `buf`, taking ownership of it. On failure the frame is
/// dropped along with the error.
pub fn parse_frame(buf: Buffer) -> Result<InPkt, ParseError> {
    let frame = buf.as_slice();
    let eth = decode_ethernet(frame)?;

    if eth.ether_type != EtherType::Ipv4 {
        return Err(ParseError::NotIpv4(eth.ether_type));
    }

    let l3 = &frame[EtherMeta::PAYLOAD_OFFSET..];
    let ip = decode_ipv4(l3)?;

    if ip.proto != Protocol::UDP {
        return Err(ParseError::NotUdp(ip.proto));
    }

    // Trailing link-layer padding is excluded here.
    let l4 = &l3[IPV4_HDR_SZ..usize::from(ip.total_len)];
    let udp = decode_udp(&ip, l4)?;

    let body_off = EtherMeta::PAYLOAD_OFFSET + IPV4_HDR_SZ + UdpHdrRaw::SIZE;
    let body_len = udp.pay_len();

    Ok(InPkt { eth, ip, udp, buf, body_off, body_len })
}
