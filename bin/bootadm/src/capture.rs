// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! Classify the frames of a packet capture the way the engine would.

use crate::AdmError;
use bootnet::engine::packet::Buffer;
use bootnet::engine::parse::parse_frame;
use bootnet::engine::tftp::OptionIter;
use bootnet::engine::tftp::TftpMsg;
use bootnet::engine::tftp::lossy_str;
use bootnet::print::write_hr;
use pcap_parser::pcap;
use std::fmt::Write as _;
use std::io::Write;
use tabwriter::TabWriter;

/// Split a pcap file into its frames.
pub fn read_capture(bytes: &[u8]) -> Result<Vec<Vec<u8>>, AdmError> {
    let (mut rest, _hdr) = pcap::parse_pcap_header(bytes)
        .map_err(|e| AdmError::Capture(format!("header: {e:?}")))?;

    let mut frames = Vec::new();
    while !rest.is_empty() {
        let (next, block) = pcap::parse_pcap_frame(rest).map_err(|e| {
            AdmError::Capture(format!("frame {}: {e:?}", frames.len() + 1))
        })?;
        frames.push(block.data.to_vec());
        rest = next;
    }

    Ok(frames)
}

fn push_options(out: &mut String, options: OptionIter) {
    for (name, val) in options {
        let _ = write!(out, " {}={}", lossy_str(name), lossy_str(val));
    }
}

/// Describe a UDP payload, as TFTP if it parses as such.
pub fn describe_payload(body: &[u8]) -> String {
    let Ok(msg) = TftpMsg::parse(body) else {
        return format!("udp len={}", body.len());
    };

    match msg {
        TftpMsg::Rrq { filename, mode, options } => {
            let mut out =
                format!("RRQ {} {}", lossy_str(filename), lossy_str(mode));
            push_options(&mut out, options);
            out
        }
        TftpMsg::Data { block, data } => {
            format!("DATA block={block} len={}", data.len())
        }
        TftpMsg::Ack { block } => format!("ACK block={block}"),
        TftpMsg::Error { code, msg } => {
            format!("ERROR 0x{code:x} {}", lossy_str(msg))
        }
        TftpMsg::OptionAck { options } => {
            let mut out = "OACK".to_string();
            push_options(&mut out, options);
            out
        }
    }
}

/// One frame's `src`, `dst` and summary columns.
pub fn describe_frame(frame: &[u8]) -> (String, String, String) {
    let dash = || "-".to_string();

    let pkt = match Buffer::from_slice(frame) {
        Ok(buf) => parse_frame(buf),
        Err(e) => return (dash(), dash(), format!("drop: {e}")),
    };

    match pkt {
        Ok(pkt) => (
            format!("{}:{}", pkt.ip.src, pkt.udp.src),
            format!("{}:{}", pkt.ip.dst, pkt.udp.dst),
            describe_payload(pkt.body()),
        ),
        Err(e) => (dash(), dash(), format!("drop: {e}")),
    }
}

pub fn print_capture(frames: &[Vec<u8>]) -> std::io::Result<()> {
    print_capture_into(&mut std::io::stdout(), frames)
}

pub fn print_capture_into(
    writer: &mut impl Write,
    frames: &[Vec<u8>],
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "NUM\tLEN\tSRC\tDST\tSUMMARY")?;
    write_hr(&mut t)?;
    for (i, frame) in frames.iter().enumerate() {
        let (src, dst, summary) = describe_frame(frame);
        writeln!(t, "{}\t{}\t{src}\t{dst}\t{summary}", i + 1, frame.len())?;
    }
    t.flush()
}

#[cfg(test)]
mod test {
    use super::*;
    use bootnet_test_utils::pcap::PcapBuilder;
    use bootnet_test_utils::*;

    #[test]
    fn payloads() {
        assert_eq!(
            describe_payload(&data_body(7, b"abc")),
            "DATA block=7 len=3"
        );
        let oack = oack_body(&[("blksize", "1024"), ("tsize", "9")]);
        assert_eq!(describe_payload(&oack), "OACK blksize=1024 tsize=9");
        assert_eq!(
            describe_payload(&error_body(2, "Access violation")),
            "ERROR 0x2 Access violation"
        );
        assert_eq!(describe_payload(&[0, 4, 0, 1]), "ACK block=1");
        assert_eq!(
            describe_payload(b"\x00\x01boot\x00octet\x00blksize\x00512\x00"),
            "RRQ boot octet blksize=512"
        );
        assert_eq!(describe_payload(&[0, 9, 1]), "udp len=3");
    }

    #[test]
    fn classify_capture() {
        let mut corrupt = server_frame(b"xyz");
        corrupt.as_mut_slice()[24] ^= 0xFF;

        let mut pcap = PcapBuilder::in_memory();
        pcap.add_frame(server_frame(&data_body(1, b"hello")).as_slice());
        pcap.add_frame(corrupt.as_slice());
        pcap.add_frame(&[0; 8]);

        let frames = read_capture(&pcap.into_bytes()).unwrap();
        assert_eq!(frames.len(), 3);

        let (src, dst, summary) = describe_frame(&frames[0]);
        assert_eq!(src, "10.0.0.69:1069");
        assert_eq!(dst, "10.0.0.2:8200");
        assert_eq!(summary, "DATA block=1 len=5");
        assert!(describe_frame(&frames[1]).2.starts_with("drop: ipv4:"));
        assert!(describe_frame(&frames[2]).2.starts_with("drop: ethernet:"));

        let mut out = Vec::new();
        print_capture_into(&mut out, &frames).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().count(), 5);
        assert!(out.lines().next().unwrap().starts_with("NUM"));
    }

    #[test]
    fn bad_capture() {
        assert!(matches!(read_capture(b"nope"), Err(AdmError::Capture(_))));
    }
}
