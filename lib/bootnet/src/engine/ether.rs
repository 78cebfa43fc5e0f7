// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Ethernet frames.

use bootnet_api::MacAddr;
use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use core::mem;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const ETHER_TYPE_IPV4: u16 = 0x0800;
pub const ETHER_TYPE_ARP: u16 = 0x0806;
pub const ETHER_TYPE_VLAN: u16 = 0x8100;
pub const ETHER_TYPE_IPV6: u16 = 0x86DD;

#[derive(Clone, Copy, Eq, Ord, PartialEq, PartialOrd)]
pub enum EtherType {
    Ipv4,
    Arp,
    Vlan,
    Ipv6,
    Unknown(u16),
}

impl From<u16> for EtherType {
    fn from(raw: u16) -> Self {
        match raw {
            ETHER_TYPE_IPV4 => Self::Ipv4,
            ETHER_TYPE_ARP => Self::Arp,
            ETHER_TYPE_VLAN => Self::Vlan,
            ETHER_TYPE_IPV6 => Self::Ipv6,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<EtherType> for u16 {
    fn from(et: EtherType) -> Self {
        use EtherType::*;

        match et {
            Ipv4 => ETHER_TYPE_IPV4,
            Arp => ETHER_TYPE_ARP,
            Vlan => ETHER_TYPE_VLAN,
            Ipv6 => ETHER_TYPE_IPV6,
            Unknown(val) => val,
        }
    }
}

impl Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04X}", u16::from(*self))
    }
}

/// We are never really interested in internal representation of
/// [`EtherType`].
impl Debug for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// A decoded Ethernet header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EtherMeta {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ether_type: EtherType,
}

impl EtherMeta {
    /// Where the Ethernet payload starts.
    pub const PAYLOAD_OFFSET: usize = EtherHdrRaw::SIZE;

    // This assumes the dst is large enough.
    #[inline]
    pub fn emit(&self, dst: &mut [u8]) {
        debug_assert!(dst.len() >= EtherHdrRaw::SIZE);
        let raw = EtherHdrRaw {
            dst: self.dst.bytes(),
            src: self.src.bytes(),
            ether_type: u16::from(self.ether_type).to_be_bytes(),
        };
        dst[..EtherHdrRaw::SIZE].copy_from_slice(raw.as_bytes());
    }

    pub fn hdr_len(&self) -> usize {
        EtherHdrRaw::SIZE
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EtherHdrError {
    Truncated { len: usize },
}

impl Display for EtherHdrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated { len } => {
                write!(f, "ethernet frame truncated at {len} bytes")
            }
        }
    }
}

/// Decode the Ethernet header at the front of `bytes`.
pub fn decode_ethernet(bytes: &[u8]) -> Result<EtherMeta, EtherHdrError> {
    let (raw, _) = EtherHdrRaw::ref_from_prefix(bytes)
        .map_err(|_| EtherHdrError::Truncated { len: bytes.len() })?;

    Ok(EtherMeta {
        dst: MacAddr::from(raw.dst),
        src: MacAddr::from(raw.src),
        ether_type: EtherType::from(u16::from_be_bytes(raw.ether_type)),
    })
}

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct EtherHdrRaw {
    pub dst: [u8; 6],
    pub src: [u8; 6],
    pub ether_type: [u8; 2],
}

impl EtherHdrRaw {
    pub const SIZE: usize = mem::size_of::<Self>();
}
