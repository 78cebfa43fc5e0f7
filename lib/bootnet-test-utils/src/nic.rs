// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! A NIC made of two queues.

use crate::TxFrame;
use crate::decode_tx;
use bootnet::api::MacAddr;
use bootnet::engine::nic::Nic;
use bootnet::engine::packet::Buffer;
use std::collections::VecDeque;

/// Frames injected by the test come out of `try_receive()`; frames
/// the engine transmits are kept for inspection.
#[derive(Debug)]
pub struct LoopbackNic {
    mac: MacAddr,
    rx: VecDeque<Buffer>,
    tx: VecDeque<Buffer>,
}

impl LoopbackNic {
    pub fn new(mac: MacAddr) -> Self {
        Self { mac, rx: VecDeque::new(), tx: VecDeque::new() }
    }

    /// Queue a frame for the engine to receive.
    pub fn inject(&mut self, frame: Buffer) {
        self.rx.push_back(frame);
    }

    pub fn inject_bytes(&mut self, frame: &[u8]) {
        self.inject(Buffer::from_slice(frame).unwrap());
    }

    pub fn rx_pending(&self) -> usize {
        self.rx.len()
    }

    /// Take every frame transmitted so far, oldest first.
    pub fn take_tx(&mut self) -> Vec<Buffer> {
        self.tx.drain(..).collect()
    }

    /// Take and decode every frame transmitted so far.
    pub fn take_tx_decoded(&mut self) -> Vec<TxFrame> {
        self.take_tx().iter().map(|f| decode_tx(f.as_slice())).collect()
    }
}

impl Nic for LoopbackNic {
    fn try_receive(&mut self) -> Option<Buffer> {
        self.rx.pop_front()
    }

    fn transmit(&mut self, frame: Buffer) {
        self.tx.push_back(frame);
    }

    fn mac_address(&self) -> MacAddr {
        self.mac
    }
}
