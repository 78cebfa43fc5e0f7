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
use serde::Deserialize;
use serde::Serialize;

pub const ETHER_ADDR_LEN: usize = 6;

/// A MAC address.
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
pub struct MacAddr {
    inner: [u8; ETHER_ADDR_LEN],
}

impl MacAddr {
    pub const BROADCAST: Self = Self { inner: [0xFF; ETHER_ADDR_LEN] };
    pub const ZERO: Self = Self { inner: [0x00; ETHER_ADDR_LEN] };

    /// Return the bytes of the MAC address.
    #[inline]
    pub fn bytes(&self) -> [u8; ETHER_ADDR_LEN] {
        self.inner
    }

    pub const fn from_const(bytes: [u8; ETHER_ADDR_LEN]) -> Self {
        Self { inner: bytes }
    }

    /// Is this the all-ones broadcast address?
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl From<[u8; ETHER_ADDR_LEN]> for MacAddr {
    fn from(bytes: [u8; ETHER_ADDR_LEN]) -> Self {
        Self { inner: bytes }
    }
}

impl From<MacAddr> for [u8; ETHER_ADDR_LEN] {
    fn from(mac: MacAddr) -> Self {
        mac.inner
    }
}

impl AsRef<[u8]> for MacAddr {
    fn as_ref(&self) -> &[u8] {
        &self.inner
    }
}

impl FromStr for MacAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets: Vec<u8> = s
            .split(':')
            .map(|s| {
                u8::from_str_radix(s, 16).map_err(|_| format!("bad octet: {s}"))
            })
            .collect::<Result<Vec<u8>, _>>()?;

        let bytes: [u8; ETHER_ADDR_LEN] = octets
            .as_slice()
            .try_into()
            .map_err(|_| {
                format!("incorrect number of bytes: {}", octets.len())
            })?;

        Ok(MacAddr { inner: bytes })
    }
}

impl Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.inner[0],
            self.inner[1],
            self.inner[2],
            self.inner[3],
            self.inner[4],
            self.inner[5]
        )
    }
}

// There's no reason to view the MAC address as its raw array, so just
// present it in a human-friendly manner.
impl Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MacAddr {{ inner: {self} }}")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn parse_and_display() {
        let mac: MacAddr = "a8:40:25:ff:77:77".parse().unwrap();
        assert_eq!(mac.bytes(), [0xA8, 0x40, 0x25, 0xFF, 0x77, 0x77]);
        assert_eq!(mac.to_string(), "A8:40:25:FF:77:77");
    }

    #[test]
    fn parse_bad() {
        assert!("a8:40:25:ff:77".parse::<MacAddr>().is_err());
        assert!("a8:40:25:ff:77:zz".parse::<MacAddr>().is_err());
        assert!("a8:40:25:ff:77:77:01".parse::<MacAddr>().is_err());
    }
}
