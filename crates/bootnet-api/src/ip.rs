// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

use alloc::str::FromStr;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use core::result;
use serde::Deserialize;
use serde::Serialize;

/// An IPv4 address.
#[derive(
    Clone,
    Copy,
    Default,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Ipv4Addr {
    inner: [u8; 4],
}

impl Ipv4Addr {
    pub const ANY_ADDR: Self = Self { inner: [0; 4] };
    pub const LOCAL_BCAST: Self = Self { inner: [255; 4] };

    /// Return the bytes of the address.
    #[inline]
    pub fn bytes(&self) -> [u8; 4] {
        self.inner
    }

    pub const fn from_const(bytes: [u8; 4]) -> Self {
        Self { inner: bytes }
    }
}

impl From<[u8; 4]> for Ipv4Addr {
    fn from(bytes: [u8; 4]) -> Self {
        Self { inner: bytes }
    }
}

impl From<Ipv4Addr> for [u8; 4] {
    fn from(ip: Ipv4Addr) -> Self {
        ip.inner
    }
}

impl From<u32> for Ipv4Addr {
    fn from(val: u32) -> Self {
        Self { inner: val.to_be_bytes() }
    }
}

impl From<core::net::Ipv4Addr> for Ipv4Addr {
    fn from(ip4: core::net::Ipv4Addr) -> Self {
        Self { inner: ip4.octets() }
    }
}

impl From<Ipv4Addr> for core::net::Ipv4Addr {
    fn from(ip4: Ipv4Addr) -> Self {
        Self::from(ip4.inner)
    }
}

impl FromStr for Ipv4Addr {
    type Err = String;

    fn from_str(val: &str) -> result::Result<Self, Self::Err> {
        let octets: Vec<u8> = val
            .split('.')
            .map(|s| s.parse().map_err(|e| format!("{e}")))
            .collect::<result::Result<Vec<u8>, _>>()?;

        let inner: [u8; 4] = octets
            .as_slice()
            .try_into()
            .map_err(|_| format!("malformed ip: {val}"))?;

        Ok(Self { inner })
    }
}

impl Display for Ipv4Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.inner[0], self.inner[1], self.inner[2], self.inner[3],
        )
    }
}

// There's no reason to view an Ipv4Addr as its raw array, so just
// present it in a human-friendly manner.
impl Debug for Ipv4Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Ipv4Addr {{ inner: {self} }}")
    }
}

pub const PROTO_ICMP: u8 = 0x1;
pub const PROTO_IGMP: u8 = 0x2;
pub const PROTO_TCP: u8 = 0x6;
pub const PROTO_UDP: u8 = 0x11;

/// The IPv4 `Protocol` field.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub enum Protocol {
    ICMP,
    IGMP,
    TCP,
    UDP,
    Unknown(u8),
}

impl Default for Protocol {
    fn default() -> Self {
        Self::Unknown(255)
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ICMP => write!(f, "ICMP"),
            Self::IGMP => write!(f, "IGMP"),
            Self::TCP => write!(f, "TCP"),
            Self::UDP => write!(f, "UDP"),
            Self::Unknown(proto) => write!(f, "Unknown({proto})"),
        }
    }
}

impl From<u8> for Protocol {
    fn from(proto: u8) -> Self {
        match proto {
            PROTO_ICMP => Self::ICMP,
            PROTO_IGMP => Self::IGMP,
            PROTO_TCP => Self::TCP,
            PROTO_UDP => Self::UDP,
            _ => Self::Unknown(proto),
        }
    }
}

impl From<Protocol> for u8 {
    fn from(proto: Protocol) -> u8 {
        match proto {
            Protocol::ICMP => PROTO_ICMP,
            Protocol::IGMP => PROTO_IGMP,
            Protocol::TCP => PROTO_TCP,
            Protocol::UDP => PROTO_UDP,
            Protocol::Unknown(v) => v,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_ipv4() {
        let ip: Ipv4Addr = "192.168.2.22".parse().unwrap();
        assert_eq!(ip.bytes(), [192, 168, 2, 22]);
        assert_eq!(Ipv4Addr::from(0xC0A80216), ip);
        assert!("192.168.2".parse::<Ipv4Addr>().is_err());
        assert!("192.168.2.256".parse::<Ipv4Addr>().is_err());
    }

    #[test]
    fn protocol_round_trip() {
        assert_eq!(Protocol::from(17), Protocol::UDP);
        assert_eq!(u8::from(Protocol::Unknown(99)), 99);
    }
}
