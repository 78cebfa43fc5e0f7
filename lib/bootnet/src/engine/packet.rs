// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Packet buffers and queues.
//!
//! A [`Buffer`] is a single owned frame: its capacity is fixed when it
//! is allocated and it never grows. Ownership moves along the receive
//! path (NIC, classifier, sink callback) and the transmit path (sink,
//! egress queue, NIC); whoever holds it last drops it.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;

/// The largest frame the engine will process.
pub const PACKET_MAXLEN: usize = 1600;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PacketError {
    /// The allocator could not provide a buffer of the requested size.
    OutOfMemory { size: usize },
    /// A write would run past the buffer's fixed capacity.
    Overflow { needed: usize, capacity: usize },
}

impl Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::OutOfMemory { size } => {
                write!(f, "out of memory allocating {size} byte packet")
            }
            Self::Overflow { needed, capacity } => {
                write!(f, "packet overflow: need {needed}, have {capacity}")
            }
        }
    }
}

/// An owned packet buffer.
///
/// `used <= data.len()` always holds; `data.len()` is the allocated
/// capacity.
#[derive(Clone, Eq, PartialEq)]
pub struct Buffer {
    data: Vec<u8>,
    used: usize,
}

impl Buffer {
    /// Allocate a zeroed buffer able to hold `size` bytes, with a used
    /// length of zero.
    pub fn alloc(size: usize) -> Result<Self, PacketError> {
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| PacketError::OutOfMemory { size })?;
        data.resize(size, 0);
        Ok(Self { data, used: 0 })
    }

    /// Allocate a buffer holding exactly `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PacketError> {
        let mut buf = Self::alloc(bytes.len())?;
        buf.extend_from_slice(bytes)?;
        Ok(buf)
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Set the used length, exposing the (zeroed or previously
    /// written) bytes up to `len`.
    pub fn set_len(&mut self, len: usize) -> Result<(), PacketError> {
        if len > self.capacity() {
            return Err(PacketError::Overflow {
                needed: len,
                capacity: self.capacity(),
            });
        }

        self.used = len;
        Ok(())
    }

    /// Append `bytes` after the used region.
    pub fn extend_from_slice(
        &mut self,
        bytes: &[u8],
    ) -> Result<(), PacketError> {
        let end = self.used + bytes.len();
        if end > self.capacity() {
            return Err(PacketError::Overflow {
                needed: end,
                capacity: self.capacity(),
            });
        }

        self.data[self.used..end].copy_from_slice(bytes);
        self.used = end;
        Ok(())
    }

    /// The used bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.used]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.used]
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Buffer {{ used: {}, capacity: {} }}",
            self.used,
            self.capacity()
        )
    }
}

/// A FIFO of packet buffers.
#[derive(Debug, Default)]
pub struct PacketQueue {
    inner: VecDeque<Buffer>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_tail(&mut self, buf: Buffer) {
        self.inner.push_back(buf);
    }

    pub fn pop_head(&mut self) -> Option<Buffer> {
        self.inner.pop_front()
    }

    pub fn peek_head(&self) -> Option<&Buffer> {
        self.inner.front()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn capacity_is_fixed() {
        let mut buf = Buffer::alloc(4).unwrap();
        assert_eq!(buf.capacity(), 4);
        assert!(buf.is_empty());
        buf.extend_from_slice(&[1, 2, 3]).unwrap();
        assert_eq!(
            buf.extend_from_slice(&[4, 5]),
            Err(PacketError::Overflow { needed: 5, capacity: 4 })
        );
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
        buf.extend_from_slice(&[4]).unwrap();
        assert_eq!(buf.capacity(), 4);
        assert!(buf.set_len(5).is_err());
        buf.set_len(2).unwrap();
        assert_eq!(buf.as_slice(), &[1, 2]);
    }

    #[test]
    fn huge_alloc_fails_cleanly() {
        assert_eq!(
            Buffer::alloc(usize::MAX).unwrap_err(),
            PacketError::OutOfMemory { size: usize::MAX }
        );
    }

    #[test]
    fn queue_is_fifo() {
        let mut q = PacketQueue::new();
        assert!(q.peek_head().is_none());
        for i in 0..3u8 {
            q.push_tail(Buffer::from_slice(&[i]).unwrap());
        }
        assert_eq!(q.len(), 3);
        assert_eq!(q.peek_head().unwrap().as_slice(), &[0]);
        assert_eq!(q.pop_head().unwrap().as_slice(), &[0]);
        assert_eq!(q.pop_head().unwrap().as_slice(), &[1]);
        assert_eq!(q.pop_head().unwrap().as_slice(), &[2]);
        assert!(q.pop_head().is_none());
        assert!(q.is_empty());
    }
}
