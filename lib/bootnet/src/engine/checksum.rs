// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Types for calculating the internet checksum.
//!
//! The [`Checksum`] type provides a rolling one's complement sum,
//! allowing a sum to be built up over several disjoint pieces (a
//! pseudo-header, a header, a payload) before finalizing it into a
//! [`HeaderChecksum`], which is the value stored in the actual header
//! bytes.
//!
//! # Checksums and Endianness
//!
//! The bytes being summed are in network order. This module reads each
//! pair of bytes as a big-endian 16-bit word and writes the finished
//! sum back out big-endian, so the arithmetic is the same on the 68k
//! (big-endian) board as on a little-endian development host. An odd
//! trailing byte is summed as the high half of a word whose low half
//! is zero; the zero is never written to the buffer.
//!
//! # Relevant RFCs
//!
//! * 768 User Datagram Protocol
//!
//! * 1071 Computing the Internet Checksum

/// The checksum value, as it is contained in a network header.
///
/// This holds the bytes as they are stored in the header itself,
/// with one's complement already applied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HeaderChecksum {
    inner: [u8; 2],
}

impl HeaderChecksum {
    /// Return the bytes of this header checksum.
    pub fn bytes(&self) -> [u8; 2] {
        self.inner
    }

    /// Wrap the checksum bytes found in a header.
    pub fn wrap(hc: [u8; 2]) -> Self {
        Self { inner: hc }
    }
}

impl From<Checksum> for HeaderChecksum {
    /// Finalize the rolling checksum and put it into header form by
    /// performing one's complement.
    fn from(mut csum: Checksum) -> HeaderChecksum {
        Self { inner: (!csum.finalize()).to_be_bytes() }
    }
}

/// A rolling one's complement checksum calculation.
///
/// Carries are accumulated in the upper half of a `u32` and folded
/// only when the finished value is needed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Checksum {
    inner: u32,
}

impl Checksum {
    /// Creates a new checksum counter.
    pub fn new() -> Self {
        Self::from(0)
    }

    /// Update the sum by adding the contents of `bytes`.
    ///
    /// Every call but the last must pass an even number of bytes for
    /// the words to line up.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.inner = csum_add(self.inner, bytes);
    }

    /// Create a new rolling checksum, starting with the passed in
    /// `bytes`.
    pub fn compute(bytes: &[u8]) -> Self {
        Self { inner: csum_add(0, bytes) }
    }

    /// Finalize the sum by adding up all the accumulated carries and
    /// returning the resulting value as a `u16`.
    pub fn finalize(&mut self) -> u16 {
        while (self.inner >> 16) != 0 {
            self.inner = (self.inner >> 16) + (self.inner & 0xFFFF);
        }

        (self.inner & 0xFFFF) as u16
    }

    /// Does this sum, which must include the stored checksum field,
    /// verify? A correct header sums to all ones.
    pub fn is_valid(mut self) -> bool {
        self.finalize() == 0xFFFF
    }
}

impl From<u32> for Checksum {
    fn from(csum: u32) -> Self {
        Self { inner: csum }
    }
}

impl core::ops::Add for Checksum {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        let mut sum = Self { inner: self.inner };
        sum += other;
        sum
    }
}

impl core::ops::AddAssign for Checksum {
    fn add_assign(&mut self, mut other: Self) {
        // Fold both sides first so long chains of additions cannot
        // overflow the accumulator.
        self.inner = self.finalize() as u32 + other.finalize() as u32;
    }
}

fn csum_add(mut csum: u32, bytes: &[u8]) -> u32 {
    let mut words = bytes.chunks_exact(2);

    for word in &mut words {
        csum += u16::from_be_bytes([word[0], word[1]]) as u32;
        // Keep the carries from spilling out of the accumulator on
        // jumbo inputs.
        if csum & 0x8000_0000 != 0 {
            csum = (csum >> 16) + (csum & 0xFFFF);
        }
    }

    if let [last] = words.remainder() {
        csum += (*last as u32) << 8;
    }

    csum
}

#[cfg(test)]
mod test {
    use super::*;

    // The worked example from RFC 1071 section 3.
    #[test]
    fn rfc1071_example() {
        let bytes = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        let mut csum = Checksum::compute(&bytes);
        assert_eq!(csum.finalize(), 0xddf2);
        let hc = HeaderChecksum::from(Checksum::compute(&bytes));
        assert_eq!(hc.bytes(), [0x22, 0x0d]);
    }

    #[test]
    fn odd_length_pads_low_byte() {
        let mut even = Checksum::compute(&[0x12, 0x34, 0x56, 0x00]);
        let mut odd = Checksum::compute(&[0x12, 0x34, 0x56]);
        assert_eq!(odd.finalize(), even.finalize());
        assert_eq!(odd.finalize(), 0x6834);
    }

    #[test]
    fn incremental_matches_whole() {
        let data: [u8; 10] =
            [0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04, 0xff, 0xff];
        let whole = Checksum::compute(&data);
        let mut parts = Checksum::compute(&data[..4]);
        parts.add_bytes(&data[4..]);
        assert_eq!(HeaderChecksum::from(whole), HeaderChecksum::from(parts));

        let sum = Checksum::compute(&data[..6]) + Checksum::compute(&data[6..]);
        assert_eq!(HeaderChecksum::from(whole), HeaderChecksum::from(sum));
    }

    #[test]
    fn stored_checksum_verifies() {
        let mut data = [0x45, 0x00, 0x00, 0x1c, 0x12, 0x34, 0x00, 0x00];
        let hc = HeaderChecksum::from(Checksum::compute(&data));
        data[6..8].copy_from_slice(&hc.bytes());
        assert!(Checksum::compute(&data).is_valid());
        data[1] ^= 0x10;
        assert!(!Checksum::compute(&data).is_valid());
    }
}
