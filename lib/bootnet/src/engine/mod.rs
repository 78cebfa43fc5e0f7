// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The packet engine: buffers, header codecs, the sink registry, and
//! the transfer protocols which sit on top of it.

pub mod checksum;
pub mod console;
pub mod ether;
pub mod ip4;
pub mod nic;
pub mod packet;
pub mod parse;
pub mod predicate;
pub mod registry;
pub mod sink;
pub mod storage;
pub mod tftp;
pub mod udp;

use alloc::string::String;
use core::fmt::Write;

/// Render `bytes` as a classic 16-bytes-per-line hex dump with an
/// offset column and a printable-ASCII gutter.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();

    for (i, chunk) in bytes.chunks(16).enumerate() {
        let _ = write!(out, "{:08x} ", i * 16);

        for idx in 0..16 {
            match chunk.get(idx) {
                Some(b) => {
                    let _ = write!(out, " {b:02x}");
                }
                None => out.push_str("   "),
            }
        }

        out.push_str("  |");
        for b in chunk {
            let c = if b.is_ascii_graphic() || *b == b' ' {
                *b as char
            } else {
                '.'
            };
            out.push(c);
        }
        out.push_str("|\n");
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex_dump_layout() {
        let dump = hex_dump(b"\x00\x05hello\x00");
        assert_eq!(
            dump,
            "00000000  00 05 68 65 6c 6c 6f 00                          |..hello.|\n"
        );

        let two = hex_dump(&[0xAA; 17]);
        assert_eq!(two.lines().count(), 2);
        assert!(two.lines().nth(1).unwrap().starts_with("00000010  aa   "));
    }
}
