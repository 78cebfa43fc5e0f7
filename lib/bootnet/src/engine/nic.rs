// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The network interface the engine sends and receives frames on.

use super::packet::Buffer;
use bootnet_api::MacAddr;

/// A raw Ethernet device.
///
/// Both directions are non-blocking: `try_receive` returns `None` when
/// nothing is pending and `transmit` either queues the frame or drops
/// it. Ownership of a transmitted frame passes to the device.
pub trait Nic {
    /// Pull the next received frame, if any.
    fn try_receive(&mut self) -> Option<Buffer>;

    /// Push a complete frame out of the interface.
    fn transmit(&mut self, frame: Buffer);

    /// The interface's hardware address.
    fn mac_address(&self) -> MacAddr;
}

impl<N: Nic + ?Sized> Nic for &mut N {
    fn try_receive(&mut self) -> Option<Buffer> {
        (**self).try_receive()
    }

    fn transmit(&mut self, frame: Buffer) {
        (**self).transmit(frame)
    }

    fn mac_address(&self) -> MacAddr {
        (**self).mac_address()
    }
}
