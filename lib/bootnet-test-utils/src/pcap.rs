// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Routines for building and reading packet capture files.

use pcap_parser::Linktype;
use pcap_parser::ToVec;
use pcap_parser::pcap;
use pcap_parser::pcap::LegacyPcapBlock;
use pcap_parser::pcap::PcapHeader;
use std::io::Write;

/// Build a packet capture from a series of frames, in memory or into
/// any writer.
pub struct PcapBuilder<W: Write> {
    out: W,
    ts_usec: u32,
}

impl PcapBuilder<Vec<u8>> {
    pub fn in_memory() -> Self {
        Self::new(Vec::new())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }
}

impl<W: Write> PcapBuilder<W> {
    pub fn new(mut out: W) -> Self {
        let mut hdr = PcapHeader {
            magic_number: 0xa1b2c3d4,
            version_major: 2,
            version_minor: 4,
            thiszone: 0,
            sigfigs: 0,
            snaplen: 1600,
            network: Linktype::ETHERNET,
        };

        out.write_all(&hdr.to_vec().unwrap()).unwrap();
        Self { out, ts_usec: 0 }
    }

    /// Add a frame to the capture. Timestamps advance by a millisecond
    /// per frame so the order survives in a viewer.
    pub fn add_frame(&mut self, frame: &[u8]) {
        self.ts_usec += 1_000;
        let mut block = LegacyPcapBlock {
            ts_sec: self.ts_usec / 1_000_000,
            ts_usec: self.ts_usec % 1_000_000,
            caplen: frame.len() as u32,
            origlen: frame.len() as u32,
            data: frame,
        };

        self.out.write_all(&block.to_vec().unwrap()).unwrap();
    }
}

/// Split a capture back into its frames.
pub fn read_frames(mut bytes: &[u8]) -> Vec<Vec<u8>> {
    let (rest, _hdr) = match pcap::parse_pcap_header(bytes) {
        Ok(v) => v,
        Err(e) => panic!("failed to get header: {e:?}"),
    };
    bytes = rest;

    let mut frames = Vec::new();
    while !bytes.is_empty() {
        match pcap::parse_pcap_frame(bytes) {
            Ok((rest, block)) => {
                // We always want access to the entire frame.
                assert_eq!(block.origlen, block.caplen);
                frames.push(block.data.to_vec());
                bytes = rest;
            }

            Err(e) => panic!("failed to get next block: {e:?}"),
        }
    }
    frames
}
