// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Predicates used for sink matching.

use super::ip4::Ipv4Addr;
use super::ip4::Protocol;
use super::parse::InPkt;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// The set of constraints a sink places on the datagrams it claims.
///
/// Each field is either `None`, matching anything, or a value the
/// datagram must carry. "Local" and "remote" are from this host's
/// point of view: local fields are compared against the destination
/// of an inbound datagram, remote fields against its source.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct SinkMatch {
    pub local_ip: Option<Ipv4Addr>,
    pub proto: Option<Protocol>,
    pub remote_ip: Option<Ipv4Addr>,
    pub local_port: Option<u16>,
    pub remote_port: Option<u16>,
}

impl SinkMatch {
    /// A match that accepts every datagram.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn local_ip(mut self, ip: Ipv4Addr) -> Self {
        self.local_ip = Some(ip);
        self
    }

    pub fn proto(mut self, proto: Protocol) -> Self {
        self.proto = Some(proto);
        self
    }

    pub fn remote_ip(mut self, ip: Ipv4Addr) -> Self {
        self.remote_ip = Some(ip);
        self
    }

    pub fn local_port(mut self, port: u16) -> Self {
        self.local_port = Some(port);
        self
    }

    pub fn remote_port(mut self, port: u16) -> Self {
        self.remote_port = Some(port);
        self
    }

    /// Does every set constraint hold for `pkt`?
    pub fn matches(&self, pkt: &InPkt) -> bool {
        fn check<T: PartialEq>(want: Option<T>, have: T) -> bool {
            want.is_none_or(|w| w == have)
        }

        check(self.local_ip, pkt.ip.dst)
            && check(self.proto, pkt.ip.proto)
            && check(self.remote_ip, pkt.ip.src)
            && check(self.local_port, pkt.udp.dst)
            && check(self.remote_port, pkt.udp.src)
    }
}

impl Display for SinkMatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn field<T: Display>(
            f: &mut fmt::Formatter,
            name: &str,
            val: &Option<T>,
        ) -> fmt::Result {
            match val {
                Some(v) => write!(f, "{name}={v}"),
                None => write!(f, "{name}=*"),
            }
        }

        field(f, "ip.dst", &self.local_ip)?;
        write!(f, " ")?;
        field(f, "ip.proto", &self.proto)?;
        write!(f, " ")?;
        field(f, "ip.src", &self.remote_ip)?;
        write!(f, " ")?;
        field(f, "udp.dst", &self.local_port)?;
        write!(f, " ")?;
        field(f, "udp.src", &self.remote_port)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::ether::EtherMeta;
    use crate::engine::ether::EtherType;
    use crate::engine::ip4::IPV4_HDR_SZ;
    use crate::engine::ip4::Ipv4Meta;
    use crate::engine::packet::Buffer;
    use crate::engine::parse::parse_frame;
    use crate::engine::udp::UdpMeta;
    use alloc::string::ToString;
    use bootnet_api::MacAddr;

    const SERVER: Ipv4Addr = Ipv4Addr::from_const([10, 0, 0, 69]);
    const ME: Ipv4Addr = Ipv4Addr::from_const([10, 0, 0, 2]);

    fn pkt(src_port: u16, dst_port: u16) -> InPkt {
        let len = 14 + IPV4_HDR_SZ + 8;
        let mut buf = Buffer::alloc(len).unwrap();
        buf.set_len(len).unwrap();
        let bytes = buf.as_mut_slice();
        EtherMeta {
            dst: MacAddr::BROADCAST,
            src: MacAddr::ZERO,
            ether_type: EtherType::Ipv4,
        }
        .emit(bytes);
        Ipv4Meta {
            src: SERVER,
            dst: ME,
            proto: Protocol::UDP,
            ttl: 64,
            ident: 0,
            total_len: (IPV4_HDR_SZ + 8) as u16,
        }
        .emit(&mut bytes[14..]);
        UdpMeta { src: src_port, dst: dst_port, len: 8, csum: [0; 2] }
            .emit(&mut bytes[34..]);
        parse_frame(buf).unwrap()
    }

    #[test]
    fn wildcards_and_values() {
        let p = pkt(1069, 8200);
        assert!(SinkMatch::any().matches(&p));

        let m = SinkMatch::any()
            .local_ip(ME)
            .proto(Protocol::UDP)
            .remote_ip(SERVER)
            .local_port(8200);
        assert!(m.matches(&p));
        assert!(m.remote_port(1069).matches(&p));
        assert!(!m.remote_port(1070).matches(&p));
        assert!(!m.local_port(8201).matches(&p));
        assert!(!m.remote_ip(ME).matches(&p));
        assert!(!m.proto(Protocol::TCP).matches(&p));
    }

    #[test]
    fn display() {
        let m = SinkMatch::any().proto(Protocol::UDP).local_port(8200);
        assert_eq!(
            m.to_string(),
            "ip.dst=* ip.proto=UDP ip.src=* udp.dst=8200 udp.src=*"
        );
    }
}
