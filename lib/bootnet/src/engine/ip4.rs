// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! IPv4 headers.
//!
//! Only the minimal 20-byte header is supported. Options and
//! fragments are rejected rather than reassembled.

use super::checksum::Checksum;
use super::checksum::HeaderChecksum;
pub use bootnet_api::Ipv4Addr;
pub use bootnet_api::Protocol;
use core::fmt;
use core::fmt::Display;
use core::mem;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

pub const IPV4_HDR_LEN_MASK: u8 = 0x0F;
pub const IPV4_HDR_VER_MASK: u8 = 0xF0;
pub const IPV4_HDR_VER_SHIFT: u8 = 4;
pub const IPV4_HDR_SZ: usize = mem::size_of::<Ipv4HdrRaw>();
pub const IPV4_VERSION: u8 = 4;

/// More-fragments flag, in the flags/offset word.
pub const IPV4_FLAG_MF: u16 = 0x2000;
/// Don't-fragment flag.
pub const IPV4_FLAG_DF: u16 = 0x4000;
pub const IPV4_FRAG_OFFSET_MASK: u16 = 0x1FFF;

pub const DEFAULT_TTL: u8 = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Ipv4Meta {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub proto: Protocol,
    pub ttl: u8,
    pub ident: u16,
    /// Header plus payload, in bytes.
    pub total_len: u16,
}

impl Ipv4Meta {
    /// Emit the header, computing its checksum along the way.
    ///
    /// This assumes the dst is large enough.
    #[inline]
    pub fn emit(&self, dst: &mut [u8]) {
        debug_assert!(dst.len() >= IPV4_HDR_SZ);
        let mut raw = Ipv4HdrRaw {
            ver_hdr_len: (IPV4_VERSION << IPV4_HDR_VER_SHIFT)
                | (IPV4_HDR_SZ / 4) as u8,
            dscp_ecn: 0,
            total_len: self.total_len.to_be_bytes(),
            ident: self.ident.to_be_bytes(),
            frag_and_flags: IPV4_FLAG_DF.to_be_bytes(),
            ttl: self.ttl,
            proto: u8::from(self.proto),
            csum: [0; 2],
            src: self.src.bytes(),
            dst: self.dst.bytes(),
        };
        raw.csum = compute_ipv4_checksum(raw.as_bytes()).bytes();
        dst[..IPV4_HDR_SZ].copy_from_slice(raw.as_bytes());
    }

    pub fn hdr_len(&self) -> usize {
        IPV4_HDR_SZ
    }

    /// Length of the payload carried after the header.
    pub fn pay_len(&self) -> usize {
        usize::from(self.total_len).saturating_sub(IPV4_HDR_SZ)
    }

    /// Return the pseudo header bytes used by the upper-layer checksum.
    pub fn pseudo_bytes(&self, ulp_len: u16) -> [u8; 12] {
        pseudo_bytes(self.src, self.dst, self.proto, ulp_len)
    }

    /// Return a [`Checksum`] of the pseudo header.
    pub fn pseudo_csum(&self, ulp_len: u16) -> Checksum {
        Checksum::compute(&self.pseudo_bytes(ulp_len))
    }
}

/// Build the 12-byte pseudo header: source, destination, a zero byte,
/// the protocol, and the upper-layer length.
pub fn pseudo_bytes(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    proto: Protocol,
    ulp_len: u16,
) -> [u8; 12] {
    let mut bytes = [0u8; 12];
    bytes[0..4].copy_from_slice(&src.bytes());
    bytes[4..8].copy_from_slice(&dst.bytes());
    bytes[9] = u8::from(proto);
    bytes[10..12].copy_from_slice(&ulp_len.to_be_bytes());
    bytes
}

/// Compute the header checksum over `hdr`, whose checksum field must
/// be zeroed.
pub fn compute_ipv4_checksum(hdr: &[u8]) -> HeaderChecksum {
    HeaderChecksum::from(Checksum::compute(hdr))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Ipv4HdrError {
    BadChecksum { csum: [u8; 2] },
    BadTotalLen { total_len: u16, avail: usize },
    BadVersion { vsn: u8 },
    Fragmented { frag_and_flags: u16 },
    Truncated { len: usize },
    UnsupportedHdrLen { hdr_len_bytes: u8 },
}

impl Display for Ipv4HdrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Ipv4HdrError::*;

        match self {
            BadChecksum { csum } => {
                write!(f, "bad header checksum: {:02X}{:02X}", csum[0], csum[1])
            }
            BadTotalLen { total_len, avail } => {
                write!(f, "bad total length {total_len} ({avail} available)")
            }
            BadVersion { vsn } => write!(f, "bad version: {vsn}"),
            Fragmented { frag_and_flags } => {
                write!(f, "fragments unsupported: {frag_and_flags:04X}")
            }
            Truncated { len } => write!(f, "header truncated at {len} bytes"),
            UnsupportedHdrLen { hdr_len_bytes } => {
                let len = hdr_len_bytes;
                write!(f, "options unsupported: header is {len} bytes")
            }
        }
    }
}

/// Decode and validate the IPv4 header at the front of `bytes`.
///
/// On success the caller may trust `total_len` to lie within `bytes`;
/// anything past it is link-layer padding.
pub fn decode_ipv4(bytes: &[u8]) -> Result<Ipv4Meta, Ipv4HdrError> {
    let (raw, _) = Ipv4HdrRaw::ref_from_prefix(bytes)
        .map_err(|_| Ipv4HdrError::Truncated { len: bytes.len() })?;

    let vsn = (raw.ver_hdr_len & IPV4_HDR_VER_MASK) >> IPV4_HDR_VER_SHIFT;
    if vsn != IPV4_VERSION {
        return Err(Ipv4HdrError::BadVersion { vsn });
    }

    let hdr_len_bytes = (raw.ver_hdr_len & IPV4_HDR_LEN_MASK) * 4;
    if usize::from(hdr_len_bytes) != IPV4_HDR_SZ {
        return Err(Ipv4HdrError::UnsupportedHdrLen { hdr_len_bytes });
    }

    let total_len = u16::from_be_bytes(raw.total_len);
    if usize::from(total_len) < IPV4_HDR_SZ
        || usize::from(total_len) > bytes.len()
    {
        return Err(Ipv4HdrError::BadTotalLen {
            total_len,
            avail: bytes.len(),
        });
    }

    if !Checksum::compute(&bytes[..IPV4_HDR_SZ]).is_valid() {
        return Err(Ipv4HdrError::BadChecksum { csum: raw.csum });
    }

    let frag_and_flags = u16::from_be_bytes(raw.frag_and_flags);
    if frag_and_flags & (IPV4_FLAG_MF | IPV4_FRAG_OFFSET_MASK) != 0 {
        return Err(Ipv4HdrError::Fragmented { frag_and_flags });
    }

    Ok(Ipv4Meta {
        src: Ipv4Addr::from(raw.src),
        dst: Ipv4Addr::from(raw.dst),
        proto: Protocol::from(raw.proto),
        ttl: raw.ttl,
        ident: u16::from_be_bytes(raw.ident),
        total_len,
    })
}

/// Note: For now we keep this unaligned to be safe.
#[repr(C)]
#[derive(
    Clone, Debug, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
pub struct Ipv4HdrRaw {
    pub ver_hdr_len: u8,
    pub dscp_ecn: u8,
    pub total_len: [u8; 2],
    pub ident: [u8; 2],
    pub frag_and_flags: [u8; 2],
    pub ttl: u8,
    pub proto: u8,
    pub csum: [u8; 2],
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

#[cfg(test)]
mod test {
    use super::*;
    use smoltcp::wire::Ipv4Packet;

    fn meta() -> Ipv4Meta {
        Ipv4Meta {
            src: "10.0.0.54".parse().unwrap(),
            dst: "52.10.128.69".parse().unwrap(),
            proto: Protocol::UDP,
            ttl: 64,
            ident: 0x4242,
            total_len: 54,
        }
    }

    #[test]
    fn emit() {
        let mut bytes = [0u8; 54];
        meta().emit(&mut bytes);

        #[rustfmt::skip]
        let expected_hdr = [
            // version + IHL, DSCP + ECN, total length
            0x45, 0x00, 0x00, 0x36,
            // ident, flags + fragment offset
            0x42, 0x42, 0x40, 0x00,
            // TTL, protocol, checksum
            0x40, 0x11, 0x39, 0xF0,
            // source
            0x0A, 0x00, 0x00, 0x36,
            // destination
            0x34, 0x0A, 0x80, 0x45,
        ];
        assert_eq!(&expected_hdr, &bytes[..IPV4_HDR_SZ]);
        assert_eq!(decode_ipv4(&bytes), Ok(meta()));
    }

    // Our checksum must agree with an independent implementation.
    #[test]
    fn smoltcp_agrees() {
        let mut bytes = [0u8; 54];
        meta().emit(&mut bytes);
        let pkt = Ipv4Packet::new_checked(&bytes[..]).unwrap();
        assert!(pkt.verify_checksum());
    }

    #[test]
    fn any_flipped_bit_fails_checksum() {
        let mut bytes = [0u8; 54];
        meta().emit(&mut bytes);

        for byte in 0..IPV4_HDR_SZ {
            for bit in 0..8 {
                let mut copy = bytes;
                copy[byte] ^= 1 << bit;
                assert!(
                    decode_ipv4(&copy).is_err(),
                    "flip of byte {byte} bit {bit} went unnoticed"
                );
            }
        }
    }

    #[test]
    fn rejects_bad_headers() {
        let mut bytes = [0u8; 54];
        meta().emit(&mut bytes);

        assert_eq!(
            decode_ipv4(&bytes[..19]),
            Err(Ipv4HdrError::Truncated { len: 19 })
        );
        assert_eq!(
            decode_ipv4(&bytes[..40]),
            Err(Ipv4HdrError::BadTotalLen { total_len: 54, avail: 40 })
        );

        let mut opts = bytes;
        opts[0] = 0x46;
        assert_eq!(
            decode_ipv4(&opts),
            Err(Ipv4HdrError::UnsupportedHdrLen { hdr_len_bytes: 24 })
        );

        let mut v6 = bytes;
        v6[0] = 0x65;
        assert_eq!(decode_ipv4(&v6), Err(Ipv4HdrError::BadVersion { vsn: 6 }));
    }

    #[test]
    fn rejects_fragments() {
        let mut m = [0u8; 54];
        meta().emit(&mut m);
        // Set MF and recompute the checksum so only the fragment check
        // trips.
        m[6] = 0x20;
        m[10] = 0;
        m[11] = 0;
        let csum = compute_ipv4_checksum(&m[..IPV4_HDR_SZ]).bytes();
        m[10..12].copy_from_slice(&csum);
        assert_eq!(
            decode_ipv4(&m),
            Err(Ipv4HdrError::Fragmented { frag_and_flags: 0x2000 })
        );
    }
}
