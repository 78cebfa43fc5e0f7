// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! A scripted TFTP server standing in for the client's NIC.
//!
//! Everything the engine transmits lands in [`TftpServer`], which
//! answers the way a windowed RFC 7440 server would and queues the
//! replies for the engine to receive on its next pump.

use crate::SERVER_IP;
use crate::SERVER_MAC;
use crate::SERVER_PORT;
use crate::TxFrame;
use crate::data_body;
use crate::decode_tx;
use crate::error_body;
use crate::oack_body;
use crate::udp_frame;
use bootnet::api::Ipv4Addr;
use bootnet::api::MacAddr;
use bootnet::engine::nic::Nic;
use bootnet::engine::packet::Buffer;
use bootnet::engine::tftp::TFTP_SERVER_PORT;
use bootnet::engine::tftp::TftpMsg;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;

#[derive(Debug)]
pub struct TftpServer {
    client_mac: MacAddr,
    client: Option<(Ipv4Addr, u16)>,
    files: BTreeMap<String, Vec<u8>>,
    /// Answer option requests with an OACK. When false, the server
    /// behaves like a pre-RFC 2347 server and starts sending data.
    pub send_oack: bool,
    /// Never answer anything.
    pub silent: bool,
    /// Blocks to drop the first time they are sent.
    pub drop_once: BTreeSet<u16>,
    file: Vec<u8>,
    blksize: usize,
    window: u16,
    final_block: u16,
    outbox: VecDeque<Buffer>,
    /// Every frame the client sent, in order.
    pub seen: Vec<TxFrame>,
    pub done: bool,
}

impl TftpServer {
    pub fn new(client_mac: MacAddr) -> Self {
        Self {
            client_mac,
            client: None,
            files: BTreeMap::new(),
            send_oack: true,
            silent: false,
            drop_once: BTreeSet::new(),
            file: Vec::new(),
            blksize: 512,
            window: 1,
            final_block: 0,
            outbox: VecDeque::new(),
            seen: Vec::new(),
            done: false,
        }
    }

    pub fn with_file(mut self, name: &str, data: Vec<u8>) -> Self {
        self.files.insert(name.to_string(), data);
        self
    }

    /// The ACK block numbers the client has sent, in order.
    pub fn acks(&self) -> Vec<u16> {
        self.seen
            .iter()
            .filter_map(|f| match f.tftp() {
                TftpMsg::Ack { block } => Some(block),
                _ => None,
            })
            .collect()
    }

    /// How many read requests the client has sent.
    pub fn rrqs(&self) -> usize {
        self.seen.iter().filter(|f| f.dst_port == TFTP_SERVER_PORT).count()
    }

    fn send(&mut self, body: &[u8]) {
        let Some((ip, port)) = self.client else {
            return;
        };
        let frame = udp_frame(
            (SERVER_MAC, SERVER_IP, SERVER_PORT),
            (self.client_mac, ip, port),
            body,
        );
        self.outbox.push_back(frame);
    }

    fn send_window(&mut self, after: u16) {
        let last = after.saturating_add(self.window).min(self.final_block);

        for block in after + 1..=last {
            if self.drop_once.remove(&block) {
                continue;
            }
            let start = (usize::from(block) - 1) * self.blksize;
            let end = (start + self.blksize).min(self.file.len());
            let body = data_body(block, &self.file[start..end]);
            self.send(&body);
        }
    }

    fn handle_rrq(&mut self, frame: &TxFrame) {
        let TftpMsg::Rrq { filename, options, .. } = frame.tftp() else {
            return;
        };

        self.client = Some((frame.src_ip, frame.src_port));
        let name = String::from_utf8_lossy(filename).into_owned();
        let Some(file) = self.files.get(&name).cloned() else {
            self.send(&error_body(1, "File not found"));
            return;
        };

        self.file = file;
        self.blksize = 512;
        self.window = 1;
        let mut reply = Vec::new();

        if self.send_oack {
            for (name, val) in options {
                let name = String::from_utf8_lossy(name).to_lowercase();
                let val = String::from_utf8_lossy(val).into_owned();
                match name.as_str() {
                    "blksize" => {
                        self.blksize = val.parse().unwrap();
                        reply.push((name, val));
                    }
                    "windowsize" => {
                        self.window = val.parse().unwrap();
                        reply.push((name, val));
                    }
                    "tsize" => {
                        reply.push((name, self.file.len().to_string()));
                    }
                    _ => {}
                }
            }
        }

        self.final_block = (self.file.len() / self.blksize + 1) as u16;

        if reply.is_empty() {
            self.send_window(0);
        } else {
            let opts: Vec<(&str, &str)> =
                reply.iter().map(|(n, v)| (n.as_str(), v.as_str())).collect();
            self.send(&oack_body(&opts));
        }
    }

    fn handle_ack(&mut self, block: u16) {
        if block == self.final_block {
            self.done = true;
        } else {
            self.send_window(block);
        }
    }
}

impl Nic for TftpServer {
    fn try_receive(&mut self) -> Option<Buffer> {
        self.outbox.pop_front()
    }

    fn transmit(&mut self, frame: Buffer) {
        let frame = decode_tx(frame.as_slice());
        self.seen.push(frame.clone());

        if self.silent || frame.dst_ip != SERVER_IP {
            return;
        }

        if frame.dst_port == TFTP_SERVER_PORT {
            self.handle_rrq(&frame);
        } else if let TftpMsg::Ack { block } = frame.tftp() {
            self.handle_ack(block);
        }
    }

    fn mac_address(&self) -> MacAddr {
        self.client_mac
    }
}
