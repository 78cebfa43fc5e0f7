// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! UDP headers.

use super::checksum::Checksum;
use super::checksum::HeaderChecksum;
use super::ip4::Ipv4Meta;
use core::fmt;
use core::fmt::Display;
use core::mem;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct UdpMeta {
    pub src: u16,
    pub dst: u16,
    /// Header plus payload, in bytes.
    pub len: u16,
    pub csum: [u8; 2],
}

impl UdpMeta {
    // This assumes the dst is large enough.
    #[inline]
    pub fn emit(&self, dst: &mut [u8]) {
        debug_assert!(dst.len() >= UdpHdrRaw::SIZE);
        dst[0..2].copy_from_slice(&self.src.to_be_bytes());
        dst[2..4].copy_from_slice(&self.dst.to_be_bytes());
        dst[4..6].copy_from_slice(&self.len.to_be_bytes());
        dst[6..8].copy_from_slice(&self.csum);
    }

    pub fn hdr_len(&self) -> usize {
        UdpHdrRaw::SIZE
    }

    pub fn pay_len(&self) -> usize {
        usize::from(self.len).saturating_sub(UdpHdrRaw::SIZE)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UdpHdrError {
    BadChecksum { csum: [u8; 2] },
    BadLength { length: u16, avail: usize },
    Truncated { len: usize },
}

impl Display for UdpHdrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadChecksum { csum } => {
                write!(f, "bad checksum: {:02X}{:02X}", csum[0], csum[1])
            }
            Self::BadLength { length, avail } => {
                write!(f, "bad length {length} ({avail} available)")
            }
            Self::Truncated { len } => {
                write!(f, "header truncated at {len} bytes")
            }
        }
    }
}

/// Decode the UDP header at the front of `bytes`, the IPv4 payload
/// described by `ip`.
///
/// A zero checksum means the sender did not compute one; any other
/// value is verified against the pseudo header and the datagram.
pub fn decode_udp(
    ip: &Ipv4Meta,
    bytes: &[u8],
) -> Result<UdpMeta, UdpHdrError> {
    let (raw, _) = UdpHdrRaw::ref_from_prefix(bytes)
        .map_err(|_| UdpHdrError::Truncated { len: bytes.len() })?;

    let length = u16::from_be_bytes(raw.length);
    if usize::from(length) < UdpHdrRaw::SIZE
        || usize::from(length) > bytes.len()
    {
        return Err(UdpHdrError::BadLength { length, avail: bytes.len() });
    }

    if raw.csum != [0; 2] {
        let mut csum = ip.pseudo_csum(length);
        csum.add_bytes(&bytes[..usize::from(length)]);
        if !csum.is_valid() {
            return Err(UdpHdrError::BadChecksum { csum: raw.csum });
        }
    }

    Ok(UdpMeta {
        src: u16::from_be_bytes(raw.src_port),
        dst: u16::from_be_bytes(raw.dst_port),
        len: length,
        csum: raw.csum,
    })
}

/// Compute the checksum of the UDP datagram `segment` (header and
/// payload, checksum field zeroed) carried by `ip`.
///
/// A sum that comes out as zero is transmitted as all ones, zero
/// being reserved for "no checksum".
pub fn compute_udp_checksum(ip: &Ipv4Meta, segment: &[u8]) -> [u8; 2] {
    let mut csum = ip.pseudo_csum(segment.len() as u16);
    csum.add_bytes(segment);
    match HeaderChecksum::from(csum).bytes() {
        [0, 0] => [0xFF, 0xFF],
        bytes => bytes,
    }
}

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct UdpHdrRaw {
    pub src_port: [u8; 2],
    pub dst_port: [u8; 2],
    pub length: [u8; 2],
    pub csum: [u8; 2],
}

impl UdpHdrRaw {
    pub const SIZE: usize = mem::size_of::<Self>();
}
