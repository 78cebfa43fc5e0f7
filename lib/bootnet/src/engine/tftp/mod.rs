// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! The Trivial File Transfer Protocol, client side.
//!
//! # Relevant RFCs
//!
//! * 1350 The TFTP Protocol (Revision 2)
//!
//! * 2347 TFTP Option Extension
//!
//! * 2348 TFTP Blocksize Option
//!
//! * 2349 TFTP Timeout Interval and Transfer Size Options
//!
//! * 7440 TFTP Windowsize Option
//!
//! The `rollover` option is not an RFC; it names the block number a
//! server resumes from after block 65535.

pub mod client;
pub mod transfer;

use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use core::ops::RangeInclusive;
use core::time::Duration;
use serde::Deserialize;
use serde::Serialize;

pub use bootnet_api::TFTP_SERVER_PORT;

pub const OP_RRQ: u16 = 1;
pub const OP_WRQ: u16 = 2;
pub const OP_DATA: u16 = 3;
pub const OP_ACK: u16 = 4;
pub const OP_ERROR: u16 = 5;
pub const OP_OACK: u16 = 6;

/// The only transfer mode we speak.
pub const MODE_OCTET: &str = "octet";

/// The block size in effect when no option says otherwise.
pub const DEFAULT_BLOCK_SIZE: u16 = 512;
/// The window size in effect when no option says otherwise.
pub const DEFAULT_WINDOW_SIZE: u16 = 1;

/// The largest read request we will build, opcode included.
pub const MAX_REQUEST: usize = 1400;

/// Opcode plus block number.
pub const DATA_HDR_LEN: usize = 4;
pub const ACK_LEN: usize = 4;

pub const OPT_BLKSIZE: &str = "blksize";
pub const OPT_ROLLOVER: &str = "rollover";
pub const OPT_TSIZE: &str = "tsize";
pub const OPT_WINDOWSIZE: &str = "windowsize";

/// The values a server may legally answer with (RFC 2348).
pub const BLKSIZE_RANGE: RangeInclusive<u64> = 8..=65464;
/// The values a server may legally answer with (RFC 7440).
pub const WINDOWSIZE_RANGE: RangeInclusive<u64> = 1..=65535;
pub const ROLLOVER_RANGE: RangeInclusive<u64> = 0..=1;

/// Client tunables.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct TftpConfig {
    /// How long to wait for the first reply before resending the read
    /// request.
    pub rrq_timeout_ms: u64,
    /// How long to wait for more data before re-acknowledging.
    pub data_timeout_ms: u64,
    /// Retransmissions allowed for one request or block before giving
    /// up.
    pub max_retransmits: u32,
    pub blksize: u16,
    pub windowsize: u16,
    pub rollover: u16,
    /// Ask the server to announce the file size.
    pub request_tsize: bool,
    /// Report progress each time this many more bytes have arrived.
    pub progress_interval: u64,
}

impl TftpConfig {
    pub fn rrq_timeout(&self) -> Duration {
        Duration::from_millis(self.rrq_timeout_ms)
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_millis(self.data_timeout_ms)
    }
}

impl Default for TftpConfig {
    fn default() -> Self {
        Self {
            rrq_timeout_ms: 1_000,
            data_timeout_ms: 250,
            max_retransmits: 10,
            blksize: 1024,
            windowsize: 8,
            rollover: 0,
            request_tsize: true,
            progress_interval: 256 * 1024,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TftpMsgError {
    /// The request does not fit in [`MAX_REQUEST`] bytes.
    RequestTooLong,
    Truncated { len: usize },
    /// A read request without its NUL-terminated filename and mode.
    MalformedRequest,
    /// An opcode a client never expects to receive.
    UnexpectedOpcode { opcode: u16 },
}

impl Display for TftpMsgError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::RequestTooLong => {
                write!(f, "request exceeds {MAX_REQUEST} bytes")
            }
            Self::Truncated { len } => {
                write!(f, "message truncated at {len} bytes")
            }
            Self::MalformedRequest => write!(f, "malformed request"),
            Self::UnexpectedOpcode { opcode } => {
                write!(f, "unexpected opcode 0x{opcode:04x}")
            }
        }
    }
}

/// A decoded TFTP message, borrowing from the datagram.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TftpMsg<'a> {
    Rrq { filename: &'a [u8], mode: &'a [u8], options: OptionIter<'a> },
    Data { block: u16, data: &'a [u8] },
    Ack { block: u16 },
    Error { code: u16, msg: &'a [u8] },
    OptionAck { options: OptionIter<'a> },
}

impl<'a> TftpMsg<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, TftpMsgError> {
        let truncated = TftpMsgError::Truncated { len: bytes.len() };
        let (opcode, body) = split_u16(bytes).ok_or(truncated)?;

        match opcode {
            OP_RRQ => {
                let (filename, rest) =
                    split_cstr(body).ok_or(TftpMsgError::MalformedRequest)?;
                let (mode, rest) =
                    split_cstr(rest).ok_or(TftpMsgError::MalformedRequest)?;
                Ok(Self::Rrq { filename, mode, options: OptionIter::new(rest) })
            }

            OP_DATA => {
                let (block, data) = split_u16(body).ok_or(truncated)?;
                Ok(Self::Data { block, data })
            }

            OP_ACK => {
                let (block, _) = split_u16(body).ok_or(truncated)?;
                Ok(Self::Ack { block })
            }

            OP_ERROR => {
                let (code, rest) = split_u16(body).ok_or(truncated)?;
                // Be lenient about a missing terminator.
                let msg = split_cstr(rest).map(|(m, _)| m).unwrap_or(rest);
                Ok(Self::Error { code, msg })
            }

            OP_OACK => Ok(Self::OptionAck { options: OptionIter::new(body) }),

            opcode => Err(TftpMsgError::UnexpectedOpcode { opcode }),
        }
    }
}

fn split_u16(bytes: &[u8]) -> Option<(u16, &[u8])> {
    match bytes {
        [hi, lo, rest @ ..] => Some((u16::from_be_bytes([*hi, *lo]), rest)),
        _ => None,
    }
}

/// Split off a NUL-terminated string, returning it without the NUL.
fn split_cstr(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let nul = bytes.iter().position(|b| *b == 0)?;
    Some((&bytes[..nul], &bytes[nul + 1..]))
}

/// Iterate the NUL-terminated `name, value` pairs of an option list.
///
/// Iteration stops at the first pair that is not fully terminated;
/// whatever was yielded before it stands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OptionIter<'a> {
    rest: &'a [u8],
}

impl<'a> OptionIter<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }
}

impl<'a> Iterator for OptionIter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let pair = split_cstr(self.rest).and_then(|(name, rest)| {
            split_cstr(rest).map(|(val, rest)| (name, val, rest))
        });

        match pair {
            Some((name, val, rest)) => {
                self.rest = rest;
                Some((name, val))
            }
            None => {
                self.rest = &[];
                None
            }
        }
    }
}

/// A negotiated option recognized by this client.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TftpOption {
    BlkSize(u16),
    Rollover(u16),
    TSize(u64),
    WindowSize(u16),
}

impl TftpOption {
    /// Interpret an option pair. Names are compared without regard to
    /// case. Unknown names, unparseable numbers and values outside the
    /// option's legal range all yield `None`.
    pub fn from_pair(name: &[u8], val: &[u8]) -> Option<Self> {
        let val = core::str::from_utf8(val).ok()?.parse::<u64>().ok()?;
        let in_range =
            |range: RangeInclusive<u64>| range.contains(&val).then_some(val);

        if name.eq_ignore_ascii_case(OPT_BLKSIZE.as_bytes()) {
            in_range(BLKSIZE_RANGE).map(|v| Self::BlkSize(v as u16))
        } else if name.eq_ignore_ascii_case(OPT_WINDOWSIZE.as_bytes()) {
            in_range(WINDOWSIZE_RANGE).map(|v| Self::WindowSize(v as u16))
        } else if name.eq_ignore_ascii_case(OPT_ROLLOVER.as_bytes()) {
            in_range(ROLLOVER_RANGE).map(|v| Self::Rollover(v as u16))
        } else if name.eq_ignore_ascii_case(OPT_TSIZE.as_bytes()) {
            Some(Self::TSize(val))
        } else {
            None
        }
    }
}

impl Display for TftpOption {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BlkSize(v) => write!(f, "{OPT_BLKSIZE}={v}"),
            Self::Rollover(v) => write!(f, "{OPT_ROLLOVER}={v}"),
            Self::TSize(v) => write!(f, "{OPT_TSIZE}={v}"),
            Self::WindowSize(v) => write!(f, "{OPT_WINDOWSIZE}={v}"),
        }
    }
}

/// A read request, built once and resent verbatim.
pub type Request = heapless::Vec<u8, MAX_REQUEST>;

/// Build a read request for `filename` asking for the options in
/// `cfg`.
pub fn emit_rrq(
    filename: &str,
    cfg: &TftpConfig,
) -> Result<Request, TftpMsgError> {
    let mut req = Request::new();
    put(&mut req, &OP_RRQ.to_be_bytes())?;
    put_cstr(&mut req, filename.as_bytes())?;
    put_cstr(&mut req, MODE_OCTET.as_bytes())?;

    // The order matches what servers have historically been tested
    // against.
    put_option(&mut req, OPT_ROLLOVER, u64::from(cfg.rollover))?;
    if cfg.request_tsize {
        put_option(&mut req, OPT_TSIZE, 0)?;
    }
    put_option(&mut req, OPT_BLKSIZE, u64::from(cfg.blksize))?;
    put_option(&mut req, OPT_WINDOWSIZE, u64::from(cfg.windowsize))?;
    Ok(req)
}

fn put(req: &mut Request, bytes: &[u8]) -> Result<(), TftpMsgError> {
    req.extend_from_slice(bytes).map_err(|_| TftpMsgError::RequestTooLong)
}

fn put_cstr(req: &mut Request, s: &[u8]) -> Result<(), TftpMsgError> {
    put(req, s)?;
    put(req, &[0])
}

fn put_option(
    req: &mut Request,
    name: &str,
    val: u64,
) -> Result<(), TftpMsgError> {
    let mut digits = heapless::String::<20>::new();
    // A u64 never needs more than 20 digits.
    let _ = core::fmt::write(&mut digits, format_args!("{val}"));
    put_cstr(req, name.as_bytes())?;
    put_cstr(req, digits.as_bytes())
}

/// Build an acknowledgement of `block`.
pub fn emit_ack(block: u16) -> [u8; ACK_LEN] {
    let [op_hi, op_lo] = OP_ACK.to_be_bytes();
    let [hi, lo] = block.to_be_bytes();
    [op_hi, op_lo, hi, lo]
}

/// Render the printable part of a server-supplied string.
pub fn lossy_str(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    #[test]
    fn rrq_layout() {
        let req = emit_rrq("kernel.bin", &TftpConfig::default()).unwrap();

        #[rustfmt::skip]
        let expected: &[u8] = b"\x00\x01\
            kernel.bin\x00\
            octet\x00\
            rollover\x000\x00\
            tsize\x000\x00\
            blksize\x001024\x00\
            windowsize\x008\x00";
        assert_eq!(&req[..], expected);

        match TftpMsg::parse(&req).unwrap() {
            TftpMsg::Rrq { filename, mode, options } => {
                assert_eq!(filename, b"kernel.bin");
                assert_eq!(mode, b"octet");
                assert_eq!(options.count(), 4);
            }
            msg => panic!("unexpected {msg:?}"),
        }
    }

    #[test]
    fn rrq_without_tsize() {
        let cfg = TftpConfig { request_tsize: false, ..Default::default() };
        let req = emit_rrq("f", &cfg).unwrap();
        let needle = b"tsize";
        assert!(!req.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn rrq_too_long() {
        let cfg = TftpConfig::default();
        let name = "x".repeat(MAX_REQUEST);
        assert_eq!(emit_rrq(&name, &cfg), Err(TftpMsgError::RequestTooLong));

        // Find the longest name that fits and check it is exact.
        let overhead = emit_rrq("", &cfg).unwrap().len();
        let name = "x".repeat(MAX_REQUEST - overhead);
        assert_eq!(emit_rrq(&name, &cfg).unwrap().len(), MAX_REQUEST);
        let name = "x".repeat(MAX_REQUEST - overhead + 1);
        assert!(emit_rrq(&name, &cfg).is_err());
    }

    #[test]
    fn ack_layout() {
        assert_eq!(emit_ack(0), [0x00, 0x04, 0x00, 0x00]);
        assert_eq!(emit_ack(0x1234), [0x00, 0x04, 0x12, 0x34]);
    }

    #[test]
    fn parse_messages() {
        assert_eq!(
            TftpMsg::parse(b"\x00\x03\x00\x07abc").unwrap(),
            TftpMsg::Data { block: 7, data: b"abc" }
        );
        assert_eq!(
            TftpMsg::parse(b"\x00\x03\x00\x07").unwrap(),
            TftpMsg::Data { block: 7, data: b"" }
        );
        assert_eq!(
            TftpMsg::parse(b"\x00\x04\xff\xff").unwrap(),
            TftpMsg::Ack { block: 0xffff }
        );
        assert_eq!(
            TftpMsg::parse(b"\x00\x05\x00\x01File not found\x00").unwrap(),
            TftpMsg::Error { code: 1, msg: b"File not found" }
        );
        assert_eq!(
            TftpMsg::parse(b"\x00\x05\x00\x02no nul").unwrap(),
            TftpMsg::Error { code: 2, msg: b"no nul" }
        );
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            TftpMsg::parse(b"\x00"),
            Err(TftpMsgError::Truncated { len: 1 })
        );
        assert_eq!(
            TftpMsg::parse(b"\x00\x03\x00"),
            Err(TftpMsgError::Truncated { len: 3 })
        );
        assert_eq!(
            TftpMsg::parse(b"\x00\x02f\x00octet\x00"),
            Err(TftpMsgError::UnexpectedOpcode { opcode: OP_WRQ })
        );
        assert_eq!(
            TftpMsg::parse(b"\x00\x09"),
            Err(TftpMsgError::UnexpectedOpcode { opcode: 9 })
        );
        assert_eq!(
            TftpMsg::parse(b"\x00\x01file-only"),
            Err(TftpMsgError::MalformedRequest)
        );
    }

    #[test]
    fn option_iter_stops_at_unterminated() {
        let opts: Vec<_> =
            OptionIter::new(b"blksize\x001024\x00tsize\x0012").collect();
        assert_eq!(opts, [(&b"blksize"[..], &b"1024"[..])]);

        assert_eq!(OptionIter::new(b"").count(), 0);
        assert_eq!(OptionIter::new(b"name-only\x00").count(), 0);
    }

    #[test]
    fn option_values() {
        use TftpOption::*;

        assert_eq!(
            TftpOption::from_pair(b"BlkSize", b"1428"),
            Some(BlkSize(1428))
        );
        assert_eq!(TftpOption::from_pair(b"blksize", b"7"), None);
        assert_eq!(TftpOption::from_pair(b"blksize", b"65465"), None);
        assert_eq!(TftpOption::from_pair(b"blksize", b"big"), None);
        assert_eq!(
            TftpOption::from_pair(b"WINDOWSIZE", b"16"),
            Some(WindowSize(16))
        );
        assert_eq!(TftpOption::from_pair(b"windowsize", b"0"), None);
        assert_eq!(
            TftpOption::from_pair(b"rollover", b"1"),
            Some(Rollover(1))
        );
        assert_eq!(TftpOption::from_pair(b"rollover", b"2"), None);
        assert_eq!(
            TftpOption::from_pair(b"tsize", b"5000000000"),
            Some(TSize(5_000_000_000))
        );
        assert_eq!(TftpOption::from_pair(b"timeout", b"5"), None);
        assert_eq!(BlkSize(1024).to_string(), "blksize=1024");
    }
}
